use assert_cmd::prelude::*;
use std::fs;
use std::process::Command;

#[test]
fn pack_then_unpack_round_trips_a_tree() {
    let work = tempfile::tempdir().unwrap();
    let tree = work.path().join("tree");
    fs::create_dir_all(tree.join("sub")).unwrap();
    fs::write(tree.join("a.txt"), b"hello from a").unwrap();
    fs::write(tree.join("sub/b.txt"), b"hello from b").unwrap();

    let archive = work.path().join("out.mkar");

    Command::cargo_bin("mkar")
        .unwrap()
        .arg(&archive)
        .arg("e")
        .arg(&tree)
        .assert()
        .success();
    assert!(archive.exists());

    let extract_dir = work.path().join("extracted");
    fs::create_dir(&extract_dir).unwrap();

    Command::cargo_bin("mkar")
        .unwrap()
        .current_dir(&extract_dir)
        .arg(&archive)
        .arg("d")
        .assert()
        .success();

    let root_name = tree.file_name().unwrap().to_string_lossy().into_owned();
    let root = extract_dir.join(root_name);
    assert_eq!(fs::read(root.join("a.txt")).unwrap(), b"hello from a");
    assert_eq!(fs::read(root.join("sub/b.txt")).unwrap(), b"hello from b");
}

#[test]
fn decode_by_logical_path_writes_a_single_file() {
    let work = tempfile::tempdir().unwrap();
    let tree = work.path().join("tree");
    fs::create_dir_all(&tree).unwrap();
    fs::write(tree.join("only.txt"), b"only content").unwrap();

    let archive = work.path().join("out.mkar");
    Command::cargo_bin("mkar")
        .unwrap()
        .arg(&archive)
        .arg("e")
        .arg(&tree)
        .assert()
        .success();

    let root_name = tree.file_name().unwrap().to_string_lossy().into_owned();
    let dest = work.path().join("single.txt");
    Command::cargo_bin("mkar")
        .unwrap()
        .arg(&archive)
        .arg("d")
        .arg(format!("{root_name}/only.txt"))
        .arg(&dest)
        .assert()
        .success();

    assert_eq!(fs::read(&dest).unwrap(), b"only content");
}
