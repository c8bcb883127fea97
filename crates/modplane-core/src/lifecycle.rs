//! Module attach/detach bookkeeping on a policy and change detection for
//! incoming instance updates.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{ModuleInstance, Result};
use crate::secure::SecureParamCrypto;

/// Strip every reference to module `name` from the instances remaining on a
/// policy: event actions targeting it and dynamic dependencies on it.
///
/// Returns the number of instances that changed.
pub fn detach_module(instances: &mut [ModuleInstance], name: &str) -> usize {
    let mut changed = 0;
    for inst in instances.iter_mut().filter(|i| i.name() != name) {
        let mut touched = false;
        for event in inst.current_event_config.values_mut() {
            let before = event.actions.len();
            event.actions.retain(|a| a.module_name != name);
            touched |= event.actions.len() != before;
        }
        let before = inst.dynamic_dependencies.len();
        inst.dynamic_dependencies.retain(|d| d.module_name != name);
        touched |= inst.dynamic_dependencies.len() != before;

        if touched {
            debug!(module = %inst.name(), removed = %name, "references to detached module removed");
            changed += 1;
        }
    }
    changed
}

/// Which fields of an incoming instance differ from the stored one.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleChanges {
    pub id: bool,
    pub name: bool,
    pub system: bool,
    pub template: bool,
    pub version: bool,
    pub policy_id: bool,
    pub join_date: bool,
    pub last_module_update: bool,
    pub state: bool,
    pub secure_default_config: bool,
    pub secure_current_config: bool,
}

impl ModuleChanges {
    /// Whether any field a user may not edit changed.
    pub fn immutable_changed(&self) -> bool {
        self.id
            || self.name
            || self.system
            || self.template
            || self.version
            || self.policy_id
            || self.join_date
            || self.last_module_update
            || self.state
            || self.secure_default_config
    }

    pub fn any(&self) -> bool {
        self.immutable_changed() || self.secure_current_config
    }
}

/// Compare `incoming` against `stored`. Secure sets are compared on their
/// plaintext, so re-encrypting a value does not count as a change.
///
/// # Errors
///
/// Fails if either instance holds a secure set that cannot be decrypted.
pub fn compare_changes(
    incoming: &ModuleInstance,
    stored: &ModuleInstance,
    crypto: &SecureParamCrypto<'_>,
) -> Result<ModuleChanges> {
    let mut incoming_plain = incoming.clone();
    incoming_plain.decrypt_secure_parameters(crypto)?;
    let mut stored_plain = stored.clone();
    stored_plain.decrypt_secure_parameters(crypto)?;

    let (a, b) = (&incoming_plain, &stored_plain);
    Ok(ModuleChanges {
        id: a.id != b.id,
        name: a.info.name != b.info.name,
        system: a.info.system != b.info.system,
        template: a.info.template != b.info.template,
        version: a.info.version != b.info.version,
        policy_id: a.policy_id != b.policy_id,
        join_date: a.join_date != b.join_date,
        last_module_update: a.last_module_update != b.last_module_update,
        state: a.state != b.state,
        secure_default_config: a.secure_default_config != b.secure_default_config,
        secure_current_config: a.secure_current_config != b.secure_current_config,
    })
}
