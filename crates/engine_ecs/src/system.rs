//! The per-type behaviour hooked into component activation.

use engine_component::FieldId;

use crate::component::{Component, ComponentStore, SystemData};

/// Behaviour attached to one component type.
///
/// The world calls into the system registered for a component's type whenever
/// that component changes state. Every hook except [`activate`] has a default
/// that matches a plain data component.
///
/// [`activate`]: ComponentSystem::activate
pub trait ComponentSystem {
    /// Components of this type may only activate while some client holds
    /// authority over them.
    fn requires_authority(&self) -> bool {
        false
    }

    /// Bring a component up. All its required dependencies are active. A
    /// `None` return fails the activation.
    fn activate(&mut self, component: &Component, store: &ComponentStore) -> Option<SystemData>;

    /// Tear a component down, handing back the data returned by
    /// [`ComponentSystem::activate`].
    fn deactivate(&mut self, _component: &Component, _data: SystemData) {}

    /// Per-tick update of an active component. Returning `true` notifies the
    /// component's reverse dependents.
    fn update(&mut self, _component: &mut Component, _dt: f32) -> bool {
        false
    }

    /// Whether `field` can be changed on an active component without a full
    /// deactivate/activate cycle.
    fn supports_live_update(&self, _field: FieldId) -> bool {
        false
    }

    /// Apply an in-place change of `field`. Returning `true` notifies the
    /// component's reverse dependents.
    fn live_update(&mut self, _component: &mut Component, _field: FieldId) -> bool {
        false
    }

    /// Whether a change in the component referenced by dependency field
    /// `field` can be absorbed without reactivation.
    fn supports_live_dependency_update(&self, _field: FieldId) -> bool {
        false
    }

    /// React in place to a change of the dependency behind `field`. Returning
    /// `true` passes the notification on to this component's own dependents.
    fn live_dependency_update(&mut self, _component: &mut Component, _field: FieldId) -> bool {
        false
    }
}
