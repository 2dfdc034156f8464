//! External-module allow-list.
//!
//! Modules on this list are left as `require` calls in the bundle; the
//! runtime host provides them.

use crate::unit::BuildUnit;

/// Always external.
pub const BASE_EXTERNALS: &[&str] = &[
    "@evan.network/ui-dapp-browser",
    "@evan.network/api-blockchain-core",
    "@evan.network/api-signer-ledger",
    "@evan.network/smart-contracts-core",
    "@evan.network/ui-angular-core",
    "@evan.network/ui-angular-libs",
    "angular-core",
    "angular-libs",
    "bcc",
    "dapp-browser",
    "smart-contracts",
    "task",
];

/// External for every unit except the one that ships them.
pub const ANGULAR_EXTERNALS: &[&str] = &[
    "@angular/core",
    "@angular/compiler",
    "@angular/platform-browser",
    "@angular/common",
    "@angular/forms",
    "rxjs",
    "rxjs/BehaviorSubject",
    "rxjs/Observable",
    "rxjs/observable/merge",
    "rxjs/operator/share",
    "rxjs/operators",
    "rxjs/Subject",
    "rxjs/Subscription",
];

/// The unit that bundles Angular and RxJS itself.
pub const ANGULAR_LIBS_UNIT: &str = "angularlibs";

/// Module names excluded from one bundling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Externals {
    modules: Vec<String>,
}

impl Externals {
    /// Build the list for a unit: base list, Angular list unless the unit is
    /// `angularlibs`, then the unit's `tsconfig.json` excludes.
    pub fn for_unit(unit: &BuildUnit) -> Self {
        Self::new(&unit.name, &unit.excludes)
    }

    pub fn new(unit_name: &str, excludes: &[String]) -> Self {
        let mut modules: Vec<String> = BASE_EXTERNALS.iter().map(|m| m.to_string()).collect();
        if unit_name != ANGULAR_LIBS_UNIT {
            modules.extend(ANGULAR_EXTERNALS.iter().map(|m| m.to_string()));
        }
        for exclude in excludes {
            if !modules.contains(exclude) {
                modules.push(exclude.clone());
            }
        }
        Self { modules }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(String::as_str)
    }

    pub fn contains(&self, module: &str) -> bool {
        self.modules.iter().any(|m| m == module)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
