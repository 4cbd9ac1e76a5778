//! Per-client bookkeeping: interest, authority and activations.

use std::collections::{BTreeMap, BTreeSet};

use engine_component::{ClientId, ComponentKey, EntityId};

use crate::emitter::EmitterAdapter;

/// What each client sees and holds.
///
/// Interest is per entity. Authority and activations are per component; they
/// mirror what the client has been told through delegate and activate ops.
#[derive(Debug, Default)]
pub struct ViewState {
    interest: BTreeMap<EntityId, BTreeSet<ClientId>>,
    authority: BTreeMap<ClientId, BTreeSet<ComponentKey>>,
    activations: BTreeMap<ClientId, BTreeSet<ComponentKey>>,
}

/// Everything a client held when it was released.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ClientRecords {
    pub interest: Vec<EntityId>,
    pub authority: Vec<ComponentKey>,
    pub activations: Vec<ComponentKey>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Interest --

    /// Returns `false` if the client was already interested.
    pub fn add_interest(&mut self, client: ClientId, entity: EntityId) -> bool {
        self.interest.entry(entity).or_default().insert(client)
    }

    /// Returns `false` if the client was not interested.
    pub fn remove_interest(&mut self, client: ClientId, entity: EntityId) -> bool {
        let Some(clients) = self.interest.get_mut(&entity) else {
            return false;
        };
        let removed = clients.remove(&client);
        if clients.is_empty() {
            self.interest.remove(&entity);
        }
        removed
    }

    #[must_use]
    pub fn is_interested(&self, client: ClientId, entity: EntityId) -> bool {
        self.interest
            .get(&entity)
            .is_some_and(|clients| clients.contains(&client))
    }

    /// Entities `client` is interested in.
    pub fn interest_of(&self, client: ClientId) -> impl Iterator<Item = EntityId> + '_ {
        self.interest
            .iter()
            .filter(move |(_, clients)| clients.contains(&client))
            .map(|(&entity, _)| entity)
    }

    // -- Authority --

    pub fn grant_authority(&mut self, client: ClientId, key: ComponentKey) -> bool {
        self.authority.entry(client).or_default().insert(key)
    }

    pub fn revoke_authority(&mut self, client: ClientId, key: ComponentKey) -> bool {
        remove_key(&mut self.authority, client, key)
    }

    #[must_use]
    pub fn holds_authority(&self, client: ClientId, key: ComponentKey) -> bool {
        self.authority
            .get(&client)
            .is_some_and(|keys| keys.contains(&key))
    }

    // -- Activations --

    pub fn add_activation(&mut self, client: ClientId, key: ComponentKey) -> bool {
        self.activations.entry(client).or_default().insert(key)
    }

    pub fn remove_activation(&mut self, client: ClientId, key: ComponentKey) -> bool {
        remove_key(&mut self.activations, client, key)
    }

    #[must_use]
    pub fn is_activated(&self, client: ClientId, key: ComponentKey) -> bool {
        self.activations
            .get(&client)
            .is_some_and(|keys| keys.contains(&key))
    }

    // -- Cleanup --

    /// Drop the authority and activations `client` holds on `entity`'s
    /// components. Returns the dropped authority keys.
    pub fn release_entity(&mut self, client: ClientId, entity: EntityId) -> Vec<ComponentKey> {
        if let Some(keys) = self.activations.get_mut(&client) {
            keys.retain(|k| k.entity != entity);
        }
        let Some(keys) = self.authority.get_mut(&client) else {
            return Vec::new();
        };
        let dropped: Vec<ComponentKey> = keys.iter().filter(|k| k.entity == entity).copied().collect();
        keys.retain(|k| k.entity != entity);
        dropped
    }

    /// Forget every record of `client`, returning what it held.
    pub fn release_client(&mut self, client: ClientId) -> ClientRecords {
        let interest: Vec<EntityId> = self.interest_of(client).collect();
        for &entity in &interest {
            self.remove_interest(client, entity);
        }
        ClientRecords {
            interest,
            authority: self
                .authority
                .remove(&client)
                .map(|keys| keys.into_iter().collect())
                .unwrap_or_default(),
            activations: self
                .activations
                .remove(&client)
                .map(|keys| keys.into_iter().collect())
                .unwrap_or_default(),
        }
    }

    /// Forget a removed component.
    pub fn forget_component(&mut self, key: ComponentKey) {
        for keys in self.authority.values_mut().chain(self.activations.values_mut()) {
            keys.remove(&key);
        }
    }

    /// Forget a removed entity: its interest and any component records.
    pub fn forget_entity(&mut self, entity: EntityId) {
        self.interest.remove(&entity);
        for keys in self.authority.values_mut().chain(self.activations.values_mut()) {
            keys.retain(|k| k.entity != entity);
        }
    }
}

fn remove_key(
    map: &mut BTreeMap<ClientId, BTreeSet<ComponentKey>>,
    client: ClientId,
    key: ComponentKey,
) -> bool {
    let Some(keys) = map.get_mut(&client) else {
        return false;
    };
    let removed = keys.remove(&key);
    if keys.is_empty() {
        map.remove(&client);
    }
    removed
}

impl EmitterAdapter for ViewState {
    fn prepare_entity_interest(&self, entity: EntityId, out: &mut Vec<ClientId>) {
        out.clear();
        if let Some(clients) = self.interest.get(&entity) {
            out.extend(clients.iter().copied());
        }
    }

    fn prepare_client_authority(&self, client: ClientId, out: &mut Vec<ComponentKey>) {
        out.clear();
        if let Some(keys) = self.authority.get(&client) {
            out.extend(keys.iter().copied());
        }
    }

    fn prepare_client_activations(&self, client: ClientId, out: &mut Vec<ComponentKey>) {
        out.clear();
        if let Some(keys) = self.activations.get(&client) {
            out.extend(keys.iter().copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use engine_component::ComponentTypeId;

    use super::*;

    fn key(entity: i64, ty: &str) -> ComponentKey {
        ComponentKey::new(EntityId(entity), ComponentTypeId::from_name(ty))
    }

    #[test]
    fn test_interest_is_per_client() {
        let mut state = ViewState::new();
        assert!(state.add_interest(ClientId(1), EntityId(5)));
        assert!(!state.add_interest(ClientId(1), EntityId(5)));
        state.add_interest(ClientId(2), EntityId(5));

        let mut out = Vec::new();
        state.prepare_entity_interest(EntityId(5), &mut out);
        assert_eq!(out, vec![ClientId(1), ClientId(2)]);

        assert!(state.remove_interest(ClientId(1), EntityId(5)));
        assert!(!state.is_interested(ClientId(1), EntityId(5)));
        assert!(state.is_interested(ClientId(2), EntityId(5)));
    }

    #[test]
    fn test_release_entity_drops_only_that_entity() {
        let mut state = ViewState::new();
        let c = ClientId(1);
        state.grant_authority(c, key(1, "client"));
        state.grant_authority(c, key(2, "client"));
        state.add_activation(c, key(1, "position"));

        assert_eq!(state.release_entity(c, EntityId(1)), vec![key(1, "client")]);
        assert!(state.holds_authority(c, key(2, "client")));
        assert!(!state.is_activated(c, key(1, "position")));
    }

    #[test]
    fn test_release_client_returns_everything() {
        let mut state = ViewState::new();
        let c = ClientId(3);
        state.add_interest(c, EntityId(1));
        state.add_interest(c, EntityId(2));
        state.grant_authority(c, key(1, "client"));
        state.add_activation(c, key(2, "position"));

        let records = state.release_client(c);
        assert_eq!(records.interest, vec![EntityId(1), EntityId(2)]);
        assert_eq!(records.authority, vec![key(1, "client")]);
        assert_eq!(records.activations, vec![key(2, "position")]);
        assert_eq!(state.release_client(c), ClientRecords::default());
    }

    #[test]
    fn test_forget_entity_clears_records() {
        let mut state = ViewState::new();
        state.add_interest(ClientId(1), EntityId(1));
        state.grant_authority(ClientId(1), key(1, "client"));
        state.forget_entity(EntityId(1));

        let mut out = Vec::new();
        state.prepare_client_authority(ClientId(1), &mut out);
        assert!(out.is_empty());
        assert!(!state.is_interested(ClientId(1), EntityId(1)));
    }
}
