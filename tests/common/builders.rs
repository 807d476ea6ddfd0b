//! Test data builders for creating test objects

use cebaf_graph::hierarchy::TypeTree;
use cebaf_graph::{Element, RunConfig};

/// Builder for inventory elements
pub struct ElementBuilder {
    element: Element,
}

impl ElementBuilder {
    pub fn new(name: &str, type_name: &str) -> Self {
        Self {
            element: Element::new(name, type_name),
        }
    }

    /// Beamline position
    pub fn s(self, s: f64) -> Self {
        self.property("S", &s.to_string())
    }

    pub fn property(mut self, key: &str, value: &str) -> Self {
        self.element = self.element.with_property(key, value);
        self
    }

    pub fn build(self) -> Element {
        self.element
    }
}

/// Type tree shared by the integration tests
pub fn injector_tree() -> TypeTree {
    serde_json::from_str(
        r#"{
            "BeamElem": {
                "Magnet": {"Quad": {"QB": null}},
                "Diagnostic": {"BPM": {"IPM": null}}
            },
            "Vacuum": {"IonPump": null}
        }"#,
    )
    .unwrap()
}

/// Two quad/BPM pairs along the beamline plus an unconfigured ion pump
pub fn injector_elements() -> Vec<Element> {
    vec![
        ElementBuilder::new("MQB0L09", "QB").s(1.5).build(),
        ElementBuilder::new("IPM0L10", "IPM").s(2.5).build(),
        ElementBuilder::new("MQB0L10", "QB").s(3.5).build(),
        ElementBuilder::new("IPM0L11", "IPM").s(4.5).build(),
        ElementBuilder::new("VIP0L11", "IonPump").s(5.0).build(),
    ]
}

/// Base YAML config; `extra` is appended verbatim
pub fn injector_config(extra: &str) -> RunConfig {
    let content = format!(
        r#"
ced:
  zone: Injector
  types: [Quad, BPM, IonPump]
mya:
  begin: "2021-11-01 00:00"
  end: "2021-11-01 03:00"
  interval: 1h
  global: [IBC0L02Current]
nodes:
  setpoints:
    Quad: [.BDL]
  readbacks:
    BPM: [.XPOS]
output:
  layout: flat
{}
"#,
        extra
    );
    let config = RunConfig::from_yaml(&content).unwrap();
    config.validate().unwrap();
    config
}
