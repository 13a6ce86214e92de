use std::collections::BTreeMap;

use super::{DefaultStrategy, MeanReversionStrategy, Strategy};

type StrategyConstructor = fn() -> Box<dyn Strategy>;

fn build_default() -> Box<dyn Strategy> {
    Box::new(DefaultStrategy::default())
}

fn build_mean_reversion() -> Box<dyn Strategy> {
    Box::new(MeanReversionStrategy::default())
}

/// Maps strategy identifiers to constructors; resolved once at startup
pub struct StrategyRegistry {
    constructors: BTreeMap<&'static str, StrategyConstructor>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry with every built-in strategy
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("default", build_default);
        registry.register("mean_reversion", build_mean_reversion);
        registry
    }

    pub fn register(&mut self, name: &'static str, constructor: StrategyConstructor) {
        self.constructors.insert(name, constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.constructors.keys().copied().collect()
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn Strategy>> {
        self.constructors.get(name).map(|build| build())
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
