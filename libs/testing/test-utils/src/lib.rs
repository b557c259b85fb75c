//! Shared test utilities for domain testing
//!
//! - `TestMongo`: MongoDB container with automatic cleanup (feature: "mongodb")
//! - `TestDataBuilder`: deterministic tenant, message and recipient identifiers
//! - `assertions`: small assertion helpers
//!
//! ```rust,ignore
//! use test_utils::{TestDataBuilder, TestMongo};
//!
//! #[tokio::test]
//! #[ignore] // Requires Docker
//! async fn feed_against_real_mongo() {
//!     let mongo = TestMongo::new().await;
//!     let data = TestDataBuilder::from_test_name("feed_against_real_mongo");
//!     let db = mongo.database(&data.database_name());
//!     let domain = data.domain("main");
//!     // ...
//! }
//! ```

#[cfg(feature = "mongodb")]
mod mongo;

#[cfg(feature = "mongodb")]
pub use mongo::TestMongo;

/// Deterministic identifiers derived from a seed.
///
/// Two builders with the same seed produce the same values, so a failing
/// test can be rerun against identical data.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seeds from a hash of the test name.
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let data = TestDataBuilder::from_test_name("test_message_rollup");
    /// assert_eq!(data.domain("a"), TestDataBuilder::from_test_name("test_message_rollup").domain("a"));
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// MongoDB database names are limited to 64 bytes, so keep this short.
    pub fn database_name(&self) -> String {
        format!("test_{:x}", self.seed)
    }

    /// e.g. `main-1a2b3c.example.test`
    pub fn domain(&self, label: &str) -> String {
        format!("{}-{:x}.example.test", label, self.seed)
    }

    pub fn msg_id(&self, n: u32) -> String {
        format!("<{:x}.{}@mail.example.test>", self.seed, n)
    }

    pub fn email(&self, local: &str) -> String {
        format!("{}+{:x}@recipients.test", local, self.seed)
    }
}

pub mod assertions {
    /// Assert that an optional value is Some
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }

    /// Assert that `items` is in non-increasing order of `key`.
    pub fn assert_sorted_desc<T, K: PartialOrd + std::fmt::Debug>(
        items: &[T],
        key: impl Fn(&T) -> K,
        context: &str,
    ) {
        for pair in items.windows(2) {
            let (a, b) = (key(&pair[0]), key(&pair[1]));
            assert!(a >= b, "{}: {:?} sorted before {:?}", context, a, b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_builder_deterministic() {
        let builder1 = TestDataBuilder::new(42);
        let builder2 = TestDataBuilder::new(42);

        assert_eq!(builder1.domain("main"), builder2.domain("main"));
        assert_eq!(builder1.msg_id(1), builder2.msg_id(1));
        assert_eq!(builder1.email("a"), builder2.email("a"));
    }

    #[test]
    fn test_data_builder_different_names() {
        let builder1 = TestDataBuilder::from_test_name("test1");
        let builder2 = TestDataBuilder::from_test_name("test2");

        assert_ne!(builder1.domain("main"), builder2.domain("main"));
    }

    #[test]
    fn test_database_name_fits_mongo_limit() {
        let builder = TestDataBuilder::new(u64::MAX);
        assert!(builder.database_name().len() < 64);
    }

    #[test]
    fn test_assert_sorted_desc_accepts_ties() {
        assertions::assert_sorted_desc(&[3, 2, 2, 1], |v| *v, "ties");
    }

    #[test]
    #[should_panic(expected = "ascending")]
    fn test_assert_sorted_desc_rejects_ascending() {
        assertions::assert_sorted_desc(&[1, 2], |v| *v, "ascending");
    }
}
