use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
struct ActionEncode {
    /// Root paths to add to the archive (files, directories, or the special
    /// prop-tagged kinds below)
    paths: Vec<String>,

    /// Encrypt PATH under key index KIX. Conflicts with -E.
    #[arg(short = 'e', num_args = 2, value_names = ["PATH", "KIX"], action = clap::ArgAction::Append, conflicts_with = "encrypt_all")]
    encrypt_each: Vec<String>,

    /// Encrypt every subsequently added entry. Conflicts with -e.
    #[arg(short = 'E')]
    encrypt_all: bool,

    /// Compress PATH. Conflicts with -C.
    #[arg(short = 'c', action = clap::ArgAction::Append, conflicts_with = "compress_all")]
    compress_each: Vec<String>,

    /// Compress every subsequently added entry. Conflicts with -c.
    #[arg(short = 'C')]
    compress_all: bool,

    /// Mark PATH as a symlink (its content is the logical path of the target).
    #[arg(short = 'l', action = clap::ArgAction::Append)]
    symlink: Vec<String>,

    /// Mark PATH as a post-install script with priority PRI.
    #[arg(short = 's', num_args = 2, value_names = ["PATH", "PRI"], action = clap::ArgAction::Append)]
    script: Vec<String>,

    /// Mark PATH as a deferred network resource (its content is a URL).
    #[arg(short = 'n', action = clap::ArgAction::Append)]
    network: Vec<String>,

    /// Explicitly mark PATH as a root entry.
    #[arg(long = "r1", action = clap::ArgAction::Append)]
    root_on: Vec<String>,

    /// Register PATH as a non-root routine.
    #[arg(long = "r0", action = clap::ArgAction::Append)]
    root_off: Vec<String>,

    /// Register a password PASSWORD under key index KIX.
    #[arg(short = 'p', num_args = 2, value_names = ["KIX", "PASSWORD"], action = clap::ArgAction::Append)]
    password: Vec<String>,
}

#[derive(Parser, Debug)]
struct ActionDecode {
    /// (SOURCE DEST) pairs. SOURCE is a logical path or `:NNN` for a literal
    /// fsid. With no pairs, every ROOTDIR entry is extracted into the
    /// current directory.
    pairs: Vec<String>,

    /// Register a password PASSWORD under key index KIX before extracting.
    #[arg(short = 'p', num_args = 2, value_names = ["KIX", "PASSWORD"], action = clap::ArgAction::Append)]
    password: Vec<String>,

    /// Safe mode: scripts are written to disk instead of run, URLs are
    /// written to disk instead of fetched.
    #[arg(short = 's')]
    safe: bool,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Encode a tree into an MKAR archive
    #[command(name = "e")]
    Encode(ActionEncode),
    /// Decode entries out of an MKAR archive
    #[command(name = "d")]
    Decode(ActionDecode),
}

#[derive(Parser, Debug)]
#[command(author, version)]
struct Args {
    /// Archive path
    archive: String,

    #[command(subcommand)]
    action: Action,
}

fn main() {
    let args = Args::parse();
    let result = match args.action {
        Action::Encode(action) => encode(&args.archive, action),
        Action::Decode(action) => decode(&args.archive, action),
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn parse_u32(s: &str, what: &str) -> Result<u32, mkar::Error> {
    s.parse::<u32>()
        .map_err(|_| mkar::Error::Other(format!("invalid {what}: {s}")))
}

fn encode(archive_path: &str, action: ActionEncode) -> Result<(), mkar::Error> {
    let file = File::create(archive_path)?;
    let mut writer = mkar::ArchiveBuilder::new().writer(BufWriter::new(file))?;

    if action.encrypt_all {
        writer.mask_prop(mkar::PROP_ENCRYPTED);
    }
    for chunk in action.encrypt_each.chunks(2) {
        let path = Path::new(&chunk[0]);
        let kix = parse_u32(&chunk[1], "KIX")?;
        writer.set_kix(path, kix)?;
        writer.add_prop(path, mkar::PROP_ENCRYPTED);
    }

    if action.compress_all {
        writer.mask_prop(mkar::PROP_COMPRESSED);
    }
    for path in &action.compress_each {
        writer.add_prop(Path::new(path), mkar::PROP_COMPRESSED);
    }

    for path in &action.symlink {
        writer.add_prop(Path::new(path), mkar::PROP_SYMLINK);
    }

    for chunk in action.script.chunks(2) {
        let path = Path::new(&chunk[0]);
        let pri = parse_u32(&chunk[1], "exec priority")?;
        writer.set_exec_pri(path, pri)?;
        writer.add_prop(path, mkar::PROP_SCRIPT);
    }

    for path in &action.network {
        writer.add_prop(Path::new(path), mkar::PROP_NETWORK);
    }

    for path in &action.root_on {
        writer.add_prop(Path::new(path), mkar::PROP_ROOTDIR);
    }
    for path in &action.root_off {
        writer.add_routine(Path::new(path), false)?;
    }

    for chunk in action.password.chunks(2) {
        let kix = parse_u32(&chunk[0], "KIX")?;
        writer.set_key(kix, chunk[1].clone())?;
    }

    for path in &action.paths {
        writer.add_routine(Path::new(path), true)?;
    }

    eprintln!("[routine done]");
    writer.run_routines()?;
    writer.finish()?.flush()?;

    println!("Packed archive {archive_path}");
    Ok(())
}

fn decode(archive_path: &str, action: ActionDecode) -> Result<(), mkar::Error> {
    let file = File::open(archive_path)?;
    let mut archive = mkar::Archive::open(BufReader::new(file))?
        .safe(action.safe)
        .with_password_callback(Box::new(InteractivePasswordCallback));
    #[cfg(feature = "network")]
    if !action.safe {
        archive = archive.with_fetcher(Box::new(mkar::UreqFetcher::new()));
    }

    for chunk in action.password.chunks(2) {
        let kix = parse_u32(&chunk[0], "KIX")?;
        archive.set_key(kix, chunk[1].clone());
    }

    archive.load_fs_table()?;
    archive.test_rootdir()?;

    if action.pairs.is_empty() {
        archive.extract_all(Path::new("."))?;
    } else {
        for chunk in action.pairs.chunks(2) {
            let source = &chunk[0];
            let dest = PathBuf::from(&chunk[1]);
            let fsid = match source.strip_prefix(':') {
                Some(rest) => parse_u32(rest, "fsid")?,
                None => archive.dump_fsid(source)?,
            };
            archive.add_routine(fsid, dest);
        }
        archive.run_routines()?;
    }
    archive.post_extract()?;

    println!("Unpacked archive {archive_path}");
    Ok(())
}

/// Prompts on stdin for a missing or incorrect password.
struct InteractivePasswordCallback;

impl InteractivePasswordCallback {
    fn prompt(&self, message: &str) -> Option<String> {
        print!("{message}");
        std::io::stdout().flush().ok()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).ok()?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

impl mkar::PasswordCallback for InteractivePasswordCallback {
    fn on_missing(&mut self, kix: u32) -> Option<String> {
        self.prompt(&format!("Please enter the key for index {kix}:\n"))
    }

    fn on_incorrect(&mut self, kix: u32) -> Option<String> {
        self.prompt(&format!(
            "The key for index {kix} is incorrect, please try again:\n"
        ))
    }
}
