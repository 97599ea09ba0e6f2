//! # Marquee Testing
//!
//! Test doubles and helpers shared by the Marquee crates' test suites.
//!
//! This crate provides:
//! - [`mocks::FixedClock`] and [`mocks::test_clock`]: deterministic time
//! - [`mocks::InMemoryProductCatalog`] / [`mocks::InMemoryPromotionCatalog`]:
//!   seedable catalog collaborators
//! - [`doubles::FlakyInventory`]: fault-injecting wrapper around any
//!   inventory implementation, for exercising the saga's transport branches
//! - [`doubles::FailingStore`]: record store whose deletes fail on demand,
//!   for exercising compensation retries and dead-lettering
//!
//! ## Example
//!
//! ```
//! use marquee_testing::test_clock;
//! use marquee_core::environment::Clock;
//!
//! let clock = test_clock();
//! assert_eq!(clock.now(), clock.now()); // Always the same!
//! ```

pub mod doubles;

/// Mock implementations of Environment traits.
pub mod mocks {
    #![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity

    use chrono::{DateTime, Utc};
    use marquee_core::catalog::{ProductCatalog, PromotionCatalog};
    use marquee_core::environment::Clock;
    use marquee_core::types::{Product, ProductId, Promotion};
    use std::collections::HashMap;
    use std::sync::RwLock;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use marquee_testing::mocks::FixedClock;
    /// use marquee_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Advanceable clock for expiry and timeout tests.
    ///
    /// Starts at a fixed instant and moves only when the test says so.
    #[derive(Debug, Default)]
    pub struct StepClock {
        time: RwLock<DateTime<Utc>>,
    }

    impl StepClock {
        /// Create a step clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: RwLock::new(time),
            }
        }

        /// Move the clock forward by `step`
        pub fn advance(&self, step: chrono::Duration) {
            let mut time = self.time.write().unwrap();
            *time += step;
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap()
        }
    }

    /// In-memory product catalog, seedable per test
    #[derive(Debug, Default)]
    pub struct InMemoryProductCatalog {
        products: RwLock<HashMap<ProductId, Product>>,
    }

    impl InMemoryProductCatalog {
        /// Create an empty catalog
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a catalog pre-seeded with products
        #[must_use]
        pub fn with_products(products: Vec<Product>) -> Self {
            let catalog = Self::new();
            for product in products {
                catalog.insert(product);
            }
            catalog
        }

        /// Add or replace a product
        pub fn insert(&self, product: Product) {
            self.products.write().unwrap().insert(product.id, product);
        }
    }

    impl ProductCatalog for InMemoryProductCatalog {
        fn product_by_id(&self, product_id: ProductId) -> Option<Product> {
            self.products.read().unwrap().get(&product_id).cloned()
        }
    }

    /// In-memory promotion catalog keyed by code, seedable per test
    #[derive(Debug, Default)]
    pub struct InMemoryPromotionCatalog {
        promotions: RwLock<HashMap<String, Promotion>>,
    }

    impl InMemoryPromotionCatalog {
        /// Create an empty catalog
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a catalog pre-seeded with promotions
        #[must_use]
        pub fn with_promotions(promotions: Vec<Promotion>) -> Self {
            let catalog = Self::new();
            for promotion in promotions {
                catalog.insert(promotion);
            }
            catalog
        }

        /// Add or replace a promotion, keyed by its code
        pub fn insert(&self, promotion: Promotion) {
            self.promotions
                .write()
                .unwrap()
                .insert(promotion.code.clone(), promotion);
        }
    }

    impl PromotionCatalog for InMemoryPromotionCatalog {
        fn promotion_by_code(&self, code: &str) -> Option<Promotion> {
            self.promotions.read().unwrap().get(code).cloned()
        }
    }
}

/// Install a tracing subscriber for test output.
///
/// Respects `RUST_LOG`; safe to call from every test — repeat installs are
/// silently ignored.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use doubles::{FailingStore, FlakyInventory};
pub use mocks::{FixedClock, InMemoryProductCatalog, InMemoryPromotionCatalog, StepClock, test_clock};
