//! Initial world contents.
//!
//! A scene file is a JSON array of entities, each listing its components and
//! their field values by name:
//!
//! ```json
//! [
//!     { "id": 1, "components": [
//!         { "type": "position", "values": { "value": { "Vec3": [0, 0, 0] } }, "active": true }
//!     ] }
//! ]
//! ```
//!
//! Activation runs after every entity is in place, so components may refer to
//! entities declared later in the file.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use engine_component::{ComponentKey, EntityId, FieldValue};
use engine_ecs::World;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct SceneEntity {
    pub id: EntityId,
    #[serde(default)]
    pub components: Vec<SceneComponent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneComponent {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub values: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Scene {
    pub entities: Vec<SceneEntity>,
}

impl Scene {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid scene")
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scene {}", path.display()))?;
        Self::from_json_str(&json)
    }

    /// Create the scene's entities and components in `world`, then activate
    /// the components marked active. Returns how many activations succeeded.
    pub fn populate(&self, world: &mut World) -> Result<usize> {
        let mut to_activate = Vec::new();
        for entity in &self.entities {
            world
                .add_entity(entity.id)
                .with_context(|| format!("scene entity {}", entity.id))?;
            for component in &entity.components {
                let key = add_component(world, entity.id, component)?;
                if component.active {
                    to_activate.push(key);
                }
            }
        }

        let mut activated = 0;
        for key in to_activate {
            if world.activate(key) {
                activated += 1;
            } else {
                warn!(component = %key, "scene component did not activate");
            }
        }
        info!(entities = self.entities.len(), activated, "scene loaded");
        Ok(activated)
    }
}

fn add_component(
    world: &mut World,
    entity: EntityId,
    component: &SceneComponent,
) -> Result<ComponentKey> {
    let ty = world
        .schema()
        .get_by_name(&component.type_name)
        .cloned()
        .ok_or_else(|| anyhow!("unknown component type {:?} on {entity}", component.type_name))?;
    let key = world.add_component(entity, &component.type_name)?;
    for (name, value) in &component.values {
        let field = ty
            .field_id(name)
            .ok_or_else(|| anyhow!("{} has no field {name:?}", ty.name))?;
        world
            .set_field(key, field, value.clone())
            .with_context(|| format!("setting {}.{name} on {entity}", ty.name))?;
    }
    Ok(key)
}
