use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
}

/// Declarative definition of one container within a task family.
///
/// `links` name sibling specs this container depends on; environment values
/// may reference sibling instance names through `{spec-name}` tokens, which
/// are rendered once every dependency has reached its final outcome.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub environment: BTreeMap<String, String>,
    pub port_mappings: Vec<PortMapping>,
    pub links: Vec<String>,
}
