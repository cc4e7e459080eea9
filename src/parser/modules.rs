//! Local Terraform module expansion.
//!
//! A `module` block whose `source` is a relative directory instantiates the
//! Terraform documents of that directory. Every instance gets its own copy
//! of the module's resources, addressed the way Terraform addresses them
//! (`module.<name>.<type>.<resource>`), and inherits the caller's
//! environment. Registry and git sources are left alone.

use crate::types::{Dialect, ModuleCall, NodeId, ParsedDocument};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};

/// Nesting limit for module calls; deeper calls (or cycles) are not expanded.
const MAX_MODULE_DEPTH: usize = 8;

struct Instance {
    /// Address below `module.`, e.g. `net` or `net.module.subnets`
    prefix: String,
    dir: PathBuf,
    environment: Option<String>,
    depth: usize,
}

/// Replace local module directories with one scoped copy per call.
///
/// Documents are returned sorted by file; copies of one file keep the
/// order in which their calls were found. Module documents nobody calls are
/// returned unchanged.
#[must_use]
pub fn expand_local_modules(parsed: Vec<ParsedDocument>) -> Vec<ParsedDocument> {
    let called: HashSet<PathBuf> = parsed
        .iter()
        .filter(|doc| doc.dialect == Dialect::Terraform)
        .flat_map(|doc| local_calls(doc).map(|(_, dir)| dir))
        .collect();
    if called.is_empty() {
        return parsed;
    }

    let mut modules: BTreeMap<PathBuf, Vec<ParsedDocument>> = BTreeMap::new();
    let mut output = Vec::with_capacity(parsed.len());
    for doc in parsed {
        let dir = directory_of(&doc.file);
        if doc.dialect == Dialect::Terraform && called.contains(&dir) {
            modules.entry(dir).or_default().push(doc);
        } else {
            output.push(doc);
        }
    }

    let mut pending: VecDeque<Instance> = output
        .iter()
        .filter(|doc| doc.dialect == Dialect::Terraform)
        .flat_map(|doc| {
            local_calls(doc).map(move |(call, dir)| Instance {
                prefix: call.name.clone(),
                dir,
                environment: doc.environment.clone(),
                depth: 1,
            })
        })
        .collect();

    let mut instantiated: HashSet<PathBuf> = HashSet::new();
    let mut instances = 0usize;
    while let Some(instance) = pending.pop_front() {
        let Some(docs) = modules.get(&instance.dir) else {
            tracing::debug!(module = %instance.prefix, dir = %instance.dir.display(), "Module directory not loaded");
            continue;
        };
        if instance.depth > MAX_MODULE_DEPTH {
            tracing::warn!(module = %instance.prefix, "Module nesting too deep, not expanded");
            continue;
        }

        let first = instantiated.insert(instance.dir.clone());
        for doc in docs {
            for (call, dir) in local_calls(doc) {
                pending.push_back(Instance {
                    prefix: format!("{}.module.{}", instance.prefix, call.name),
                    dir,
                    environment: instance.environment.clone(),
                    depth: instance.depth + 1,
                });
            }
        }
        output.extend(instantiate(docs, &instance, first));
        instances += 1;
    }

    for (dir, docs) in modules {
        if !instantiated.contains(&dir) {
            output.extend(docs);
        }
    }
    if instances > 0 {
        tracing::info!(instances, "Expanded local modules");
    }

    output.sort_by(|a, b| a.file.cmp(&b.file));
    output
}

/// Copy the documents of one module directory into a module instance.
fn instantiate(docs: &[ParsedDocument], instance: &Instance, keep_diagnostics: bool) -> Vec<ParsedDocument> {
    let mut renamed: HashMap<NodeId, NodeId> = HashMap::new();
    let mut copies: Vec<ParsedDocument> = docs
        .iter()
        .map(|doc| {
            let mut copy = doc.clone();
            for node in &mut copy.nodes {
                let old = node.id.clone();
                node.scope_to_module(&instance.prefix);
                renamed.insert(old, node.id.clone());
            }
            copy.set_environment(instance.environment.clone());
            if !keep_diagnostics {
                copy.diagnostics.clear();
            }
            copy
        })
        .collect();

    for copy in &mut copies {
        for hint in &mut copy.hints {
            if let Some(id) = renamed.get(&hint.from) {
                hint.from.clone_from(id);
            }
            if let Some(id) = renamed.get(&hint.to) {
                hint.to.clone_from(id);
            }
        }
    }
    copies
}

/// Local module calls of a document with the directory each one names.
fn local_calls(doc: &ParsedDocument) -> impl Iterator<Item = (&ModuleCall, PathBuf)> {
    let base = directory_of(&doc.file);
    doc.modules
        .iter()
        .filter(|call| call.is_local())
        .map(move |call| (call, normalize(&base.join(&call.source))))
}

fn directory_of(file: &Path) -> PathBuf {
    normalize(file.parent().unwrap_or_else(|| Path::new("")))
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::parser::parse_document;
    use crate::types::{Diagnostic, SourceDocument};
    use pretty_assertions::assert_eq;

    fn parse(path: &str, content: &str) -> ParsedDocument {
        parse_document(&SourceDocument::new(path, Dialect::Terraform, content), &Config::default())
    }

    fn ids(docs: &[ParsedDocument]) -> Vec<&str> {
        docs.iter().flat_map(|d| d.nodes.iter().map(|n| n.id.as_str())).collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("envs/prod/../../modules/./net")), PathBuf::from("modules/net"));
        assert_eq!(normalize(Path::new("../shared")), PathBuf::from("../shared"));
        assert_eq!(normalize(Path::new("/infra/app/../net")), PathBuf::from("/infra/net"));
    }

    #[test]
    fn test_each_call_gets_its_own_instance() {
        let root = parse(
            "main.tf",
            r#"
module "orders" {
  source = "./modules/queue"
}
module "payments" {
  source = "./modules/queue"
}
module "vpc" {
  source  = "terraform-aws-modules/vpc/aws"
}
"#,
        );
        let module = parse(
            "modules/queue/main.tf",
            r#"
resource "aws_sqs_queue" "dlq" {}
resource "aws_sqs_queue" "main" {
  depends_on = [aws_sqs_queue.dlq]
}
"#,
        );

        let expanded = expand_local_modules(vec![root, module]);
        assert_eq!(
            ids(&expanded),
            vec![
                "tf:aws_sqs_queue:module.orders.dlq",
                "tf:aws_sqs_queue:module.orders.main",
                "tf:aws_sqs_queue:module.payments.dlq",
                "tf:aws_sqs_queue:module.payments.main",
            ]
        );
        let hints: Vec<(&str, &str)> = expanded
            .iter()
            .flat_map(|d| d.hints.iter().map(|h| (h.from.as_str(), h.to.as_str())))
            .collect();
        assert_eq!(
            hints,
            vec![
                ("tf:aws_sqs_queue:module.orders.dlq", "tf:aws_sqs_queue:module.orders.main"),
                ("tf:aws_sqs_queue:module.payments.dlq", "tf:aws_sqs_queue:module.payments.main"),
            ]
        );
        assert!(expanded[1].nodes.iter().all(|n| n.module.as_deref() == Some("orders")));
    }

    #[test]
    fn test_nested_modules_and_caller_environment() {
        let root = parse(
            "environments/prod/main.tf",
            "module \"app\" {\n  source = \"../../modules/app\"\n}\n",
        );
        let app = parse(
            "modules/app/main.tf",
            "module \"db\" {\n  source = \"../db\"\n}\nresource \"aws_instance\" \"web\" {}\n",
        );
        let db = parse("modules/db/main.tf", "resource \"aws_db_instance\" \"main\" {}\n");

        let expanded = expand_local_modules(vec![root, app, db]);
        assert_eq!(
            ids(&expanded),
            vec!["tf:aws_instance:module.app.web", "tf:aws_db_instance:module.app.module.db.main"]
        );
        for doc in &expanded {
            assert_eq!(doc.environment.as_deref(), Some("prod"));
            assert!(doc.nodes.iter().all(|n| n.environment.as_deref() == Some("prod")));
        }
    }

    #[test]
    fn test_uncalled_and_self_calling_modules() {
        let lonely = parse("modules/lonely/main.tf", "resource \"aws_s3_bucket\" \"b\" {}\n");
        let looping = parse(
            "modules/loop/main.tf",
            "module \"again\" {\n  source = \"./\"\n}\nresource \"aws_sns_topic\" \"t\" {}\n",
        );
        let root = parse("main.tf", "module \"start\" {\n  source = \"./modules/loop\"\n}\n");

        let expanded = expand_local_modules(vec![root, lonely, looping]);
        let ids = ids(&expanded);
        assert!(ids.contains(&"tf:aws_s3_bucket:b"));
        assert!(ids.contains(&"tf:aws_sns_topic:module.start.t"));
        assert_eq!(ids.iter().filter(|id| id.starts_with("tf:aws_sns_topic:")).count(), MAX_MODULE_DEPTH);
    }

    #[test]
    fn test_module_diagnostics_reported_once() {
        let root = parse(
            "main.tf",
            "module \"a\" {\n  source = \"./mod\"\n}\nmodule \"b\" {\n  source = \"./mod\"\n}\n",
        );
        let module = parse(
            "mod/main.tf",
            "resource \"aws_vpc\" \"ok\" {}\nresource \"aws_subnet\" \"bad\" {\n  cidr_block = = 1\n}\n",
        );
        assert_eq!(module.diagnostics.len(), 1);

        let expanded = expand_local_modules(vec![root, module]);
        let diagnostics: Vec<&Diagnostic> = expanded.iter().flat_map(|d| d.diagnostics.iter()).collect();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(ids(&expanded), vec!["tf:aws_vpc:module.a.ok", "tf:aws_vpc:module.b.ok"]);
    }
}
