//! The unified `Device.` schema tree (§3, §4.2, §4.3).
//!
//! The tree is a flat path-keyed map rather than a linked node structure —
//! every operation the core performs (resolve, prefix-scan, group-scoped
//! teardown) is a string-keyed lookup or range scan, and §5 mandates a
//! single-threaded owner with no internal locking, so a `HashMap` behind a
//! plain `&mut self` API is the right shape (unlike the owning-Service
//! intrusive lists described in §9, which exist for cyclic back-references
//! this tree doesn't have).

use std::collections::HashMap;

use crate::error::BrokerError;
use crate::ids::GroupId;
use crate::schema::types::{ObjectKind, SchemaNode};

/// Validates a path a Service wants to register or the Broker wants to
/// resolve against (§4.3).
///
/// Rules enforced:
/// - must start with `Device.`
/// - object (registrable) paths must end with `.`
/// - no empty segments (`..`)
/// - no segment may be empty or start with a digit, except an instance
///   segment, which must be entirely digits (the concrete instance number
///   substituted for a `{i}` placeholder)
/// - `{i}` itself (an un-instantiated template placeholder) is rejected —
///   Register must name concrete or wildcard-free prefixes (§4.3)
///
/// Accepts instance segments (`Device.WiFi.Radio.1.`), since a resolved
/// object path is allowed to name concrete instances. Use
/// [`validate_register_prefix`] where instance numbers themselves must be
/// rejected, i.e. when classifying a Register prefix.
pub fn validate_object_path(path: &str) -> Result<(), BrokerError> {
    validate_path(path, false)
}

/// As [`validate_object_path`], but additionally rejects any all-digit
/// instance segment — a Register prefix must be "syntactically free of
/// instance numbers" (§3 Invariants, §4.3).
pub fn validate_register_prefix(path: &str) -> Result<(), BrokerError> {
    validate_path(path, true)
}

fn validate_path(path: &str, reject_instance_segments: bool) -> Result<(), BrokerError> {
    if !path.starts_with("Device.") {
        return Err(BrokerError::register_failure(
            path,
            "path must start with \"Device.\"",
        ));
    }
    if !path.ends_with('.') {
        return Err(BrokerError::register_failure(
            path,
            "object path must end with \".\"",
        ));
    }

    let body = &path[..path.len() - 1];
    for segment in body.split('.') {
        if segment.is_empty() {
            return Err(BrokerError::register_failure(path, "empty path segment"));
        }
        if segment == "{i}" {
            return Err(BrokerError::register_failure(
                path,
                "un-instantiated template placeholder \"{i}\" is not registrable",
            ));
        }
        let is_all_digits = segment.chars().all(|c| c.is_ascii_digit());
        if is_all_digits {
            if reject_instance_segments {
                return Err(BrokerError::register_failure(
                    path,
                    format!(
                        "segment \"{segment}\" names a concrete instance number, \
                         which a Register prefix may not contain"
                    ),
                ));
            }
        } else {
            let starts_with_digit = segment.chars().next().is_some_and(|c| c.is_ascii_digit());
            if starts_with_digit {
                return Err(BrokerError::register_failure(
                    path,
                    format!("segment \"{segment}\" starts with a digit but is not numeric"),
                ));
            }
            if !segment.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(BrokerError::register_failure(
                    path,
                    format!("segment \"{segment}\" contains an invalid character"),
                ));
            }
        }
    }
    Ok(())
}

/// Counts the number of compound-key components implied by a path's
/// instance segments, used to enforce `max_compound_key_components` (§6).
pub fn compound_key_components(path: &str) -> usize {
    path.split('.')
        .filter(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()))
        .count()
}

/// The unified schema tree, keyed by fully-qualified object path.
#[derive(Debug, Default)]
pub struct SchemaTree {
    nodes: HashMap<String, SchemaNode>,
}

impl SchemaTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&SchemaNode> {
        self.nodes.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    /// Resolves any path — object or parameter — to the object node that
    /// owns it, by exact match first and otherwise the longest registered
    /// object path that is a prefix of `path` (used by the Passthrough
    /// Router's "resolves in the current schema" check, §4.7).
    pub fn resolve_owning_object(&self, path: &str) -> Option<&SchemaNode> {
        if let Some(node) = self.nodes.get(path) {
            return Some(node);
        }
        self.nodes
            .values()
            .filter(|node| path.starts_with(node.path.as_str()))
            .max_by_key(|node| node.path.len())
    }

    /// Installs a placeholder object node, used both when Register accepts a
    /// prefix before GetSupportedDM resolves it (§4.2) and when Add installs
    /// a placeholder schema owner for a freshly-created instance (§4.1).
    pub fn insert_placeholder(&mut self, path: &str, group: GroupId) {
        self.nodes
            .insert(path.to_string(), SchemaNode::placeholder(path, group));
    }

    pub fn insert(&mut self, node: SchemaNode) {
        self.nodes.insert(node.path.clone(), node);
    }

    /// Removes every node whose path starts with `prefix`, returning the
    /// removed paths. Used on Deregister and on Service teardown (§4.2, §4.8).
    pub fn remove_subtree(&mut self, prefix: &str) -> Vec<String> {
        let doomed: Vec<String> = self
            .nodes
            .keys()
            .filter(|path| path.starts_with(prefix))
            .cloned()
            .collect();
        for path in &doomed {
            self.nodes.remove(path);
        }
        doomed
    }

    /// All object paths currently owned by `group`, in no particular order.
    pub fn paths_owned_by(&self, group: GroupId) -> Vec<String> {
        self.nodes
            .values()
            .filter(|node| node.group == group)
            .map(|node| node.path.clone())
            .collect()
    }

    /// Whether `path` is still a placeholder (schema not yet imported).
    pub fn is_placeholder(&self, path: &str) -> bool {
        matches!(
            self.nodes.get(path).map(|n| &n.kind),
            Some(ObjectKind::Placeholder)
        )
    }

    /// Every object path strictly nested under `path`, no more than
    /// `max_depth` path segments deeper, used to bound the Passthrough
    /// Router's recursive Get/GetInstances permission walk (§4.7).
    pub fn descendant_object_paths(&self, path: &str, max_depth: u32) -> Vec<String> {
        let base_depth = path.split('.').filter(|s| !s.is_empty()).count();
        self.nodes
            .values()
            .filter(|node| node.path != path && node.path.starts_with(path))
            .filter(|node| {
                let depth = node.path.split('.').filter(|s| !s.is_empty()).count();
                depth.saturating_sub(base_depth) <= max_depth as usize
            })
            .map(|node| node.path.clone())
            .collect()
    }

    /// Every top-level multi-instance object path under `prefix`, used to
    /// drive the refresh-instances hook (§4.2 rule 2).
    pub fn top_level_multi_instance_objects_under(&self, prefix: &str) -> Vec<String> {
        self.nodes
            .values()
            .filter(|node| node.path.starts_with(prefix))
            .filter(|node| {
                matches!(
                    node.kind,
                    ObjectKind::MultiInstance {
                        top_level: true,
                        ..
                    }
                )
            })
            .map(|node| node.path.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
