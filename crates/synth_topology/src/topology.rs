//! Service/operation graph construction.
//!
//! The graph is built in two passes: pass one materializes every service
//! and operation (parsing durations, error rates and attribute generators),
//! pass two resolves call targets. Operations refer to each other through
//! [`OpRef`] handles rather than owning pointers, so the graph stays a
//! plain tree of maps that can be shared immutably across workers.

use crate::error::{Error, Result};
use crate::generator::AttributeGenerator;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use synth_model::{parse_distribution, Config, Distribution, ErrorRateSpec, OperationConfig};
use tracing::debug;

/// Composite identity of an operation: `(service, operation)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpRef {
    /// Owning service name.
    pub service: String,
    /// Operation name within the service.
    pub operation: String,
}

impl OpRef {
    /// Creates a reference from its parts.
    #[must_use]
    pub fn new(service: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            operation: operation.into(),
        }
    }

    /// Parses a `"svc.op"` reference, splitting on the first `.` so
    /// operation names may contain dots.
    ///
    /// # Errors
    ///
    /// Returns an error when either half is empty or the `.` is missing.
    pub fn parse(input: &str) -> Result<Self> {
        match input.split_once('.') {
            Some((service, operation)) if !service.is_empty() && !operation.is_empty() => {
                Ok(Self::new(service, operation))
            }
            _ => Err(Error::Build(format!(
                "reference '{input}' must have the form 'service.operation'"
            ))),
        }
    }
}

impl fmt::Display for OpRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.service, self.operation)
    }
}

/// How an operation's child calls are timed relative to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallStyle {
    /// Children start together at the parent's start.
    #[default]
    Parallel,
    /// Children run back to back, advancing timestamps.
    Sequential,
}

/// A resolved downstream call.
#[derive(Debug, Clone)]
pub struct Call {
    /// The called operation.
    pub target: OpRef,
    /// Fraction of traces that include this call.
    pub probability: f64,
    /// Number of repeated invocations per inclusion.
    pub count: u32,
}

/// A materialized operation.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Owning service name (lookup relation, not ownership).
    pub service: String,
    /// Operation name.
    pub name: String,
    /// Latency distribution.
    pub duration: Distribution,
    /// Probability that an execution is marked as an error.
    pub error_rate: f64,
    /// Downstream calls in declaration order.
    pub calls: Vec<Call>,
    /// Child timing style.
    pub call_style: CallStyle,
    /// Attribute generators keyed by attribute name.
    pub attributes: BTreeMap<String, AttributeGenerator>,
}

impl Operation {
    /// Returns this operation's composite reference.
    #[must_use]
    pub fn op_ref(&self) -> OpRef {
        OpRef::new(self.service.clone(), self.name.clone())
    }
}

/// A service and its operations.
#[derive(Debug, Clone)]
pub struct Service {
    /// Service name.
    pub name: String,
    /// Static attributes stamped on every span of this service.
    pub attributes: BTreeMap<String, String>,
    /// Operations keyed by name.
    pub operations: BTreeMap<String, Operation>,
}

/// The validated, acyclic service graph.
#[derive(Debug, Clone)]
pub struct Topology {
    /// Services keyed by name.
    pub services: BTreeMap<String, Service>,
    /// Operations never named as a call target, in lexicographic order.
    pub roots: Vec<OpRef>,
}

/// Supplies default attribute generators for a domain tag.
pub trait DomainResolver {
    /// Returns the defaults for `domain`, or `None` when the tag is
    /// unknown.
    fn resolve(&self, domain: &str) -> Option<BTreeMap<String, AttributeGenerator>>;
}

impl Topology {
    /// Builds the graph from a validated config.
    ///
    /// # Errors
    ///
    /// Returns an error for unparseable operation scalars, unresolvable
    /// call targets, domain tags without a resolver, unknown domain tags,
    /// or a cyclic call graph.
    pub fn build(config: &Config, resolver: Option<&dyn DomainResolver>) -> Result<Self> {
        let mut services = BTreeMap::new();
        for (service_name, service_config) in &config.services {
            let mut operations = BTreeMap::new();
            for (operation_name, operation_config) in &service_config.operations {
                let operation =
                    build_operation(service_name, operation_name, operation_config, resolver)
                        .map_err(|e| {
                            Error::Build(format!(
                                "service {service_name} operation {operation_name}: {e}"
                            ))
                        })?;
                operations.insert(operation_name.clone(), operation);
            }
            services.insert(
                service_name.clone(),
                Service {
                    name: service_name.clone(),
                    attributes: service_config.attributes.clone(),
                    operations,
                },
            );
        }

        let mut targets: BTreeSet<OpRef> = BTreeSet::new();
        for service in services.values() {
            for operation in service.operations.values() {
                for call in &operation.calls {
                    if lookup(&services, &call.target).is_none() {
                        return Err(Error::UnknownTarget {
                            from: operation.op_ref().to_string(),
                            target: call.target.to_string(),
                        });
                    }
                    targets.insert(call.target.clone());
                }
            }
        }

        detect_cycles(&services)?;

        let roots: Vec<OpRef> = services
            .values()
            .flat_map(|service| service.operations.values())
            .map(Operation::op_ref)
            .filter(|op_ref| !targets.contains(op_ref))
            .collect();
        debug!(
            services = services.len(),
            roots = roots.len(),
            "topology built"
        );

        Ok(Self { services, roots })
    }

    /// Looks up an operation by reference.
    #[must_use]
    pub fn operation(&self, op_ref: &OpRef) -> Option<&Operation> {
        lookup(&self.services, op_ref)
    }

    /// Returns the total number of operations in the graph.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.services
            .values()
            .map(|service| service.operations.len())
            .sum()
    }
}

fn lookup<'a>(services: &'a BTreeMap<String, Service>, op_ref: &OpRef) -> Option<&'a Operation> {
    services
        .get(&op_ref.service)
        .and_then(|service| service.operations.get(&op_ref.operation))
}

fn build_operation(
    service_name: &str,
    operation_name: &str,
    config: &OperationConfig,
    resolver: Option<&dyn DomainResolver>,
) -> Result<Operation> {
    let duration = parse_distribution(&config.duration)?;
    let error_rate = config
        .error_rate
        .as_ref()
        .map(ErrorRateSpec::resolve)
        .transpose()?
        .unwrap_or(0.0);

    let call_style = match config.call_style.as_deref() {
        None | Some("" | "parallel") => CallStyle::Parallel,
        Some("sequential") => CallStyle::Sequential,
        Some(other) => {
            return Err(Error::Build(format!("unknown call_style '{other}'")));
        }
    };

    let mut attributes = BTreeMap::new();
    if let Some(domain) = &config.domain {
        let resolver = resolver.ok_or_else(|| {
            Error::Build(format!(
                "domain '{domain}' declared but no domain resolver provided"
            ))
        })?;
        let defaults = resolver
            .resolve(domain)
            .ok_or_else(|| Error::Build(format!("unknown domain '{domain}'")))?;
        attributes.extend(defaults);
    }
    for (attribute_name, spec) in &config.attributes {
        let generator = AttributeGenerator::from_spec(spec)
            .map_err(|e| Error::Build(format!("attribute '{attribute_name}': {e}")))?;
        // Per-operation attributes win over domain defaults.
        attributes.insert(attribute_name.clone(), generator);
    }

    let mut calls = Vec::with_capacity(config.calls.len());
    for call in &config.calls {
        calls.push(Call {
            target: OpRef::parse(call.target())?,
            probability: call.probability(),
            count: call.count(),
        });
    }

    Ok(Operation {
        service: service_name.to_string(),
        name: operation_name.to_string(),
        duration,
        error_rate,
        calls,
        call_style,
        attributes,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

fn detect_cycles(services: &BTreeMap<String, Service>) -> Result<()> {
    let mut marks: BTreeMap<OpRef, Mark> = services
        .values()
        .flat_map(|service| service.operations.values())
        .map(|operation| (operation.op_ref(), Mark::Unvisited))
        .collect();

    let all: Vec<OpRef> = marks.keys().cloned().collect();
    for op_ref in &all {
        visit(services, &mut marks, op_ref)?;
    }
    Ok(())
}

fn visit(
    services: &BTreeMap<String, Service>,
    marks: &mut BTreeMap<OpRef, Mark>,
    op_ref: &OpRef,
) -> Result<()> {
    match marks.get(op_ref) {
        Some(Mark::Visited) => return Ok(()),
        Some(Mark::Visiting) => {
            return Err(Error::Cycle(op_ref.to_string()));
        }
        _ => {}
    }

    marks.insert(op_ref.clone(), Mark::Visiting);
    if let Some(operation) = lookup(services, op_ref) {
        for call in &operation.calls {
            visit(services, marks, &call.target)?;
        }
    }
    marks.insert(op_ref.clone(), Mark::Visited);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::AttributeValue;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn chain_config() -> Config {
        Config::from_yaml(
            r#"
version: 1
services:
  gateway:
    attributes:
      region: us-east-1
    operations:
      "GET /users":
        duration: "30ms +/- 10ms"
        calls:
          - backend.list
  backend:
    operations:
      list:
        duration: "20ms +/- 5ms"
traffic:
  rate: "100/s"
"#,
        )
        .unwrap()
    }

    #[test]
    fn builds_two_service_chain() {
        let topology = Topology::build(&chain_config(), None).unwrap();

        assert_eq!(topology.operation_count(), 2);
        assert_eq!(topology.roots, vec![OpRef::new("gateway", "GET /users")]);

        let root = topology.operation(&topology.roots[0].clone()).unwrap();
        assert_eq!(root.calls.len(), 1);
        assert_eq!(root.calls[0].target, OpRef::new("backend", "list"));
        assert_eq!(root.call_style, CallStyle::Parallel);
    }

    #[test]
    fn roots_are_never_call_targets() {
        let topology = Topology::build(&chain_config(), None).unwrap();

        let targets: Vec<OpRef> = topology
            .services
            .values()
            .flat_map(|service| service.operations.values())
            .flat_map(|operation| operation.calls.iter().map(|call| call.target.clone()))
            .collect();

        for root in &topology.roots {
            assert!(!targets.contains(root), "root {root} is a call target");
        }
    }

    #[test]
    fn build_after_validate_is_idempotent() {
        let config = chain_config();
        config.validate().unwrap();
        let first = Topology::build(&config, None).unwrap();
        let second = Topology::build(&config, None).unwrap();

        assert_eq!(first.roots, second.roots);
        assert_eq!(first.operation_count(), second.operation_count());
    }

    #[test]
    fn rejects_unknown_call_target() {
        let config = Config::from_yaml(
            r#"
version: 1
services:
  gateway:
    operations:
      front:
        duration: "10ms"
        calls:
          - backend.missing
traffic:
  rate: "1/s"
"#,
        )
        .unwrap();

        let err = Topology::build(&config, None).unwrap_err();
        assert!(err.to_string().contains("backend.missing"));
    }

    #[test]
    fn rejects_cycles() {
        let config = Config::from_yaml(
            r#"
version: 1
services:
  a:
    operations:
      op1:
        duration: "10ms"
        calls:
          - b.op2
  b:
    operations:
      op2:
        duration: "10ms"
        calls:
          - a.op1
traffic:
  rate: "1/s"
"#,
        )
        .unwrap();

        let err = Topology::build(&config, None).unwrap_err();
        assert!(err.to_string().contains("cycle"), "error was: {err}");
    }

    #[test]
    fn rejects_self_loop() {
        let config = Config::from_yaml(
            r#"
version: 1
services:
  a:
    operations:
      op1:
        duration: "10ms"
        calls:
          - a.op1
traffic:
  rate: "1/s"
"#,
        )
        .unwrap();

        assert!(Topology::build(&config, None).is_err());
    }

    #[test]
    fn op_ref_splits_on_first_dot() {
        let op_ref = OpRef::parse("gateway.GET /v1.users").unwrap();
        assert_eq!(op_ref.service, "gateway");
        assert_eq!(op_ref.operation, "GET /v1.users");

        assert!(OpRef::parse("no-dot").is_err());
        assert!(OpRef::parse(".op").is_err());
    }

    struct TestResolver;

    impl DomainResolver for TestResolver {
        fn resolve(&self, domain: &str) -> Option<BTreeMap<String, AttributeGenerator>> {
            if domain != "http" {
                return None;
            }
            let mut defaults = BTreeMap::new();
            defaults.insert(
                "http.method".to_string(),
                AttributeGenerator::Static(AttributeValue::from("GET")),
            );
            defaults.insert(
                "http.scheme".to_string(),
                AttributeGenerator::Static(AttributeValue::from("https")),
            );
            Some(defaults)
        }
    }

    fn domain_config(domain: &str) -> Config {
        Config::from_yaml(&format!(
            r#"
version: 1
services:
  api:
    operations:
      front:
        domain: {domain}
        duration: "10ms"
        attributes:
          http.method:
            value: POST
traffic:
  rate: "1/s"
"#
        ))
        .unwrap()
    }

    #[test]
    fn domain_defaults_merge_with_operation_precedence() {
        let topology = Topology::build(&domain_config("http"), Some(&TestResolver)).unwrap();
        let operation = topology
            .operation(&OpRef::new("api", "front"))
            .unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(
            operation.attributes["http.method"].generate(&mut rng),
            AttributeValue::String("POST".to_string())
        );
        assert_eq!(
            operation.attributes["http.scheme"].generate(&mut rng),
            AttributeValue::String("https".to_string())
        );
    }

    #[test]
    fn domain_without_resolver_is_rejected() {
        let err = Topology::build(&domain_config("http"), None).unwrap_err();
        assert!(err.to_string().contains("domain"));
    }

    #[test]
    fn unknown_domain_is_rejected() {
        let err = Topology::build(&domain_config("grpc"), Some(&TestResolver)).unwrap_err();
        assert!(err.to_string().contains("grpc"));
    }
}
