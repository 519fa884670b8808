//! The Schema Importer: projects a `GetSupportedDMResp` onto the unified
//! tree, replacing whatever placeholder was installed at Register time
//! (§4.2 import rules 1-4).

use crate::ids::GroupId;
use crate::message::{GetSupportedDmResponse, SupportedObject};
use crate::schema::tree::SchemaTree;
use crate::schema::types::{CommandNode, EventNode, ObjectKind, ParamNode, ParamType, SchemaNode};

/// Whether a multi-instance object's path, as reported by GetSupportedDM
/// (templated with `{i}` placeholders, never literal instance numbers), has
/// no ancestor instance segment of its own — i.e. it is a top-level
/// multi-instance object rather than one nested under another (§4.2 rule
/// 2's "top-level" multi-instance object).
fn is_top_level_multi_instance(path: &str) -> bool {
    let body = path.strip_suffix('.').unwrap_or(path);
    let segments: Vec<&str> = body.split('.').collect();
    let ancestor_segments = segments.split_last().map(|(_, ancestors)| ancestors).unwrap_or(&[]);
    let ancestor_instance_segments = ancestor_segments.iter().filter(|s| **s == "{i}").count();
    ancestor_instance_segments == 0
}

/// Converts one `SupportedObject` entry into the schema nodes it implies,
/// and installs them in `tree` under `group`.
///
/// Rules applied (§4.2):
/// 1. a non-multi-instance object becomes a single-instance node;
/// 2. a multi-instance object becomes a `MultiInstance` node, and if it is
///    top-level (no ancestor instance segment) the caller is expected to
///    follow up with a `GetInstances`/`RefreshInstances` round-trip;
/// 3. each parameter's protocol type tag is translated via
///    [`ParamType::from_protocol_tag`], defaulting to `String`;
/// 4. events and commands are attached verbatim.
pub fn import_object(tree: &mut SchemaTree, group: GroupId, object: &SupportedObject) {
    let kind = if object.is_multi_instance {
        ObjectKind::MultiInstance {
            writable: object.writable,
            top_level: is_top_level_multi_instance(&object.path),
        }
    } else {
        ObjectKind::SingleInstance
    };

    let params = object
        .params
        .iter()
        .map(|p| ParamNode {
            name: p.name.clone(),
            param_type: ParamType::from_protocol_tag(&p.protocol_type),
            writable: p.writable,
        })
        .collect();

    let events = object
        .events
        .iter()
        .map(|e| EventNode {
            name: e.name.clone(),
            arg_names: e.arg_names.clone(),
        })
        .collect();

    let commands = object
        .commands
        .iter()
        .map(|c| CommandNode {
            name: c.name.clone(),
            input_arg_names: c.input_arg_names.clone(),
            output_arg_names: c.output_arg_names.clone(),
        })
        .collect();

    tree.insert(SchemaNode {
        path: object.path.clone(),
        kind,
        group,
        params,
        events,
        commands,
    });
}

/// Imports every object in a `GetSupportedDMResp`, replacing any placeholder
/// nodes installed at Register time. Returns the paths of top-level
/// multi-instance objects that need a follow-up instance refresh.
pub fn import_response(
    tree: &mut SchemaTree,
    group: GroupId,
    response: &GetSupportedDmResponse,
) -> Vec<String> {
    for object in &response.objects {
        import_object(tree, group, object);
    }

    response
        .objects
        .iter()
        .filter(|o| o.is_multi_instance && is_top_level_multi_instance(&o.path))
        .map(|o| o.path.clone())
        .collect()
}
