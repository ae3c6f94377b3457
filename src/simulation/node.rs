use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use super::value::{Value, ValueIdentity};

/// A simulated device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: u32,
    pub product: String,
    /// Declaration order is kept for display
    pub values: Vec<Value>,
}

impl Node {
    pub fn new(id: u32, product: impl Into<String>) -> Self {
        let product = product.into();
        info!("create node id: {}, product: {}", id, product);
        Self {
            id,
            product,
            values: Vec::new(),
        }
    }

    /// Replaces the value collection wholesale; the last call wins.
    pub fn init_values(&mut self, values: Vec<Value>) {
        info!("node id: {} init {} values", self.id, values.len());
        self.values = values;
    }

    pub fn value(&self, identity: ValueIdentity) -> Option<&Value> {
        self.values.iter().find(|v| v.identity() == identity)
    }

    pub fn value_mut(&mut self, identity: ValueIdentity) -> Option<&mut Value> {
        self.values.iter_mut().find(|v| v.identity() == identity)
    }

    /// Refreshes every dynamic value and returns clones of those that changed.
    pub fn refresh_all<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<Value> {
        let refreshed: Vec<Value> = self
            .values
            .iter_mut()
            .filter(|value| value.vtype.is_dynamic())
            .map(|value| {
                value.refresh_with(&mut *rng);
                value.clone()
            })
            .collect();
        debug!("node id: {} refreshed {} values", self.id, refreshed.len());
        refreshed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::value::{ValueDescription, ValueType};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn value(idx: u32, vtype: &str) -> Value {
        Value::from_description(&ValueDescription {
            cls: Some(49),
            inst: Some(1),
            idx: Some(idx),
            label: Some(format!("value {}", idx)),
            vtype: Some(vtype.into()),
            units: None,
            value: Some("0".into()),
        })
        .unwrap()
    }

    #[test]
    fn new_node_has_no_values() {
        let node = Node::new(2, "Sensor-A");
        assert_eq!(node.id, 2);
        assert_eq!(node.product, "Sensor-A");
        assert!(node.values.is_empty());
    }

    #[test]
    fn init_values_replaces_instead_of_accumulating() {
        let mut node = Node::new(1, "Sensor-A");
        node.init_values(vec![value(1, "int"), value(2, "float")]);
        node.init_values(vec![value(3, "static")]);

        assert_eq!(node.values.len(), 1);
        assert_eq!(node.values[0].idx, 3);
        assert_eq!(node.values[0].vtype, ValueType::Static);
    }

    #[test]
    fn lookup_by_identity() {
        let mut node = Node::new(1, "Sensor-A");
        node.init_values(vec![value(1, "int"), value(2, "float")]);
        let identity = ValueIdentity {
            cls: 49,
            inst: 1,
            idx: 2,
        };
        assert_eq!(node.value(identity).map(|v| v.vtype), Some(ValueType::Float));
        assert!(node
            .value_mut(ValueIdentity { idx: 9, ..identity })
            .is_none());
    }

    #[test]
    fn refresh_all_skips_static_values() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut node = Node::new(1, "Sensor-A");
        node.init_values(vec![value(1, "int"), value(2, "static"), value(3, "none")]);

        let refreshed = node.refresh_all(&mut rng);
        assert_eq!(refreshed.len(), 1);
        assert_eq!(refreshed[0].idx, 1);
        assert_eq!(node.values[1].value.as_deref(), Some("0"));
    }
}
