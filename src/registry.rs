use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::error::SimError;

/// Name of a registered kind. Kinds are compiled in, so names are static.
pub type KindName = &'static str;

/// Open-set factory for one variant family (headers, payloads, packets,
/// nodes, links or events).
///
/// A prototype registers once under a name and is looked up purely by
/// name afterwards; the dispatching code never has to know the concrete
/// set of kinds. Registration is last-wins per name.
#[derive(Debug)]
pub struct Registry<P> {
    family: &'static str,
    protos: FxHashMap<KindName, P>,
}

impl<P> Registry<P> {
    #[must_use]
    pub fn new(family: &'static str) -> Registry<P> {
        Registry {
            family,
            protos: FxHashMap::default(),
        }
    }

    pub fn register(&mut self, name: KindName, proto: P) {
        self.protos.insert(name, proto);
    }

    pub fn get(&self, name: &str) -> Result<&P, SimError> {
        self.protos.get(name).ok_or_else(|| SimError::UnknownKind {
            family: self.family,
            name: name.to_owned(),
        })
    }

    /// Like [`Registry::get`], but also resolves the borrowed name to its
    /// static registered form.
    pub fn lookup(&self, name: &str) -> Result<(KindName, &P), SimError> {
        self.protos
            .get_key_value(name)
            .map(|(k, p)| (*k, p))
            .ok_or_else(|| SimError::UnknownKind {
                family: self.family,
                name: name.to_owned(),
            })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.protos.contains_key(name)
    }

    /// Registered kind names in a stable order, for listings.
    #[must_use]
    pub fn names(&self) -> Vec<KindName> {
        self.protos.keys().copied().sorted().collect()
    }
}
