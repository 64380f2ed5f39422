//! Password retrieval for encrypted entries.
//!
//! The unpacker holds a trait object rather than a global callback, so
//! multiple archives (or tests) can each supply their own policy without
//! touching shared state.

/// Supplies passwords for key indices encountered while unpacking. `&mut
/// self` so an interactive impl can track attempt counts or cache a
/// previously entered password.
pub trait PasswordCallback {
    /// Called when no password is registered for `kix`. `None` aborts with
    /// [`crate::Error::MissingPassword`]; `Some(password)` is tried.
    fn on_missing(&mut self, kix: u32) -> Option<String>;

    /// Called after a registered or previously supplied password fails to
    /// decrypt `kix`'s payload. `None` aborts with
    /// [`crate::Error::IncorrectPassword`]; `Some(password)` is retried.
    fn on_incorrect(&mut self, kix: u32) -> Option<String>;
}

/// Never supplies a password; every encrypted entry without a pre-registered
/// key fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPasswordCallback;

impl PasswordCallback for NoPasswordCallback {
    fn on_missing(&mut self, _kix: u32) -> Option<String> {
        None
    }
    fn on_incorrect(&mut self, _kix: u32) -> Option<String> {
        None
    }
}

/// Offers a single fixed password for every key index, retrying exactly
/// once before giving up.
#[derive(Debug, Clone)]
pub struct SinglePassword {
    password: String,
    offered: bool,
}

impl SinglePassword {
    pub fn new(password: impl Into<String>) -> Self {
        SinglePassword {
            password: password.into(),
            offered: false,
        }
    }
}

impl PasswordCallback for SinglePassword {
    fn on_missing(&mut self, _kix: u32) -> Option<String> {
        self.offered = true;
        Some(self.password.clone())
    }
    fn on_incorrect(&mut self, _kix: u32) -> Option<String> {
        if self.offered {
            None
        } else {
            self.offered = true;
            Some(self.password.clone())
        }
    }
}

/// Looks a password up by key index in a fixed table, offering each at most
/// once.
#[derive(Debug, Clone, Default)]
pub struct PasswordTable {
    table: std::collections::HashMap<u32, String>,
    offered: std::collections::HashSet<u32>,
}

impl PasswordTable {
    pub fn new(table: std::collections::HashMap<u32, String>) -> Self {
        PasswordTable {
            table,
            offered: Default::default(),
        }
    }
}

impl PasswordCallback for PasswordTable {
    fn on_missing(&mut self, kix: u32) -> Option<String> {
        self.offered.insert(kix);
        self.table.get(&kix).cloned()
    }
    fn on_incorrect(&mut self, kix: u32) -> Option<String> {
        if self.offered.contains(&kix) {
            None
        } else {
            self.offered.insert(kix);
            self.table.get(&kix).cloned()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_password_always_none() {
        let mut cb = NoPasswordCallback;
        assert_eq!(cb.on_missing(0), None);
        assert_eq!(cb.on_incorrect(0), None);
    }

    #[test]
    fn single_password_offers_once_then_gives_up() {
        let mut cb = SinglePassword::new("swordfish");
        assert_eq!(cb.on_missing(1).as_deref(), Some("swordfish"));
        assert_eq!(cb.on_incorrect(1), None);
    }

    #[test]
    fn table_looks_up_by_kix_and_stops_after_one_try() {
        let mut table = std::collections::HashMap::new();
        table.insert(3, "abc".to_string());
        let mut cb = PasswordTable::new(table);
        assert_eq!(cb.on_missing(3).as_deref(), Some("abc"));
        assert_eq!(cb.on_missing(4), None);
        assert_eq!(cb.on_incorrect(3), None);
    }
}
