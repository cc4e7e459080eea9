//! Integration tests for IacMap.
//!
//! These tests run the whole pipeline over the fixture documents and check
//! the graph, cluster, complexity and layout results end to end.

use iacmap::analyzer::{ClusterKind, DiagramComplexity};
use iacmap::graph::{Edge, EdgeKind, StyleHint};
use iacmap::layout::{Direction, LayoutDeriver};
use iacmap::{Config, Diagnostic, Dialect, Pipeline, PipelineOutput, SourceDocument};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// Get the path to the test fixtures directory.
fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn tf(path: &str, content: &str) -> SourceDocument {
    SourceDocument::new(path, Dialect::Terraform, content)
}

async fn run_fixture(name: &str) -> PipelineOutput {
    Pipeline::new(Config::default())
        .run_paths(&[fixtures_path().join(name)])
        .await
        .unwrap()
}

fn run_docs(docs: Vec<SourceDocument>) -> PipelineOutput {
    Pipeline::new(Config::default()).run(docs).unwrap()
}

fn node_ids(output: &PipelineOutput) -> Vec<&str> {
    output.graph.nodes.iter().map(|n| n.id.as_str()).collect()
}

fn find_edge<'a>(output: &'a PipelineOutput, from: &str, to: &str) -> Option<&'a Edge> {
    output.graph.edges.iter().find(|e| e.from == from && e.to == to)
}

fn assert_graph_invariants(output: &PipelineOutput) {
    let mut pairs = HashSet::new();
    for edge in &output.graph.edges {
        assert_ne!(edge.from, edge.to, "self-loop on {}", edge.from);
        assert!(pairs.insert((&edge.from, &edge.to)), "duplicate edge {} -> {}", edge.from, edge.to);
    }

    let clusters: BTreeMap<&str, _> = output.graph.clusters.iter().map(|c| (c.id.as_str(), c)).collect();
    for cluster in &output.graph.clusters {
        let mut current = cluster;
        let mut steps = 0;
        while let Some(parent) = current.parent.as_deref() {
            current = clusters[parent];
            steps += 1;
            assert!(steps <= clusters.len(), "parent chain of {} does not terminate", cluster.id);
        }
    }

    for kind in ClusterKind::ALL {
        if !output.graph.clusters.iter().any(|c| c.kind == kind) {
            assert_eq!(kind, ClusterKind::Environment, "no {kind} clusters");
            continue;
        }
        for node in &output.graph.nodes {
            let owners = output
                .graph
                .clusters
                .iter()
                .filter(|c| c.kind == kind && c.member_ids.contains(&node.id))
                .count();
            assert_eq!(owners, 1, "{} belongs to {owners} {kind} clusters", node.id);
        }
    }
}

mod scenario_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_attribute_reference_creates_one_edge() {
        let doc = tf(
            "main.tf",
            r#"
resource "aws_s3_bucket" "logs" {
  bucket = "logs"
}

resource "aws_cloudwatch_log_group" "app" {
  name = "app-${aws_s3_bucket.logs.arn}"
}
"#,
        );
        let output = Pipeline::new(Config::default()).run(vec![doc]).unwrap();

        assert_eq!(output.graph.edges.len(), 1);
        let edge = &output.graph.edges[0];
        assert_eq!(edge.from, "tf:aws_s3_bucket:logs");
        assert_eq!(edge.to, "tf:aws_cloudwatch_log_group:app");
        assert_eq!(edge.kind, EdgeKind::AttributeReference);
    }

    #[tokio::test]
    async fn test_network_containment_terraform() {
        let output = run_fixture("terraform").await;
        let forest: BTreeMap<&str, _> = output
            .graph
            .clusters
            .iter()
            .filter(|c| c.kind == ClusterKind::NetworkContainer)
            .map(|c| (c.id.as_str(), c))
            .collect();

        let vpc = forest["network:tf:aws_vpc:main"];
        assert_eq!(vpc.parent, None);
        assert_eq!(vpc.label, "prod");

        let subnet = forest["network:tf:aws_subnet:app"];
        assert_eq!(subnet.parent.as_deref(), Some("network:tf:aws_vpc:main"));
        assert!(subnet.member_ids.contains("tf:aws_instance:web"));
        assert!(vpc.member_ids.contains("tf:aws_security_group:web"));

        assert!(!forest.contains_key(iacmap::analyzer::UNGROUPED_CLUSTER_ID));
        assert!(!output.has_diagnostics(), "{:?}", output.diagnostics);
        assert_eq!(output.complexity.max_cluster_depth, 2);
    }

    #[tokio::test]
    async fn test_network_containment_bicep() {
        let output = run_fixture("bicep").await;
        let subnet = output
            .graph
            .clusters
            .iter()
            .find(|c| c.id == "network:bicep:Microsoft.Network/virtualNetworks/subnets:app")
            .unwrap();

        assert_eq!(
            subnet.parent.as_deref(),
            Some("network:bicep:Microsoft.Network/virtualNetworks:vnet")
        );
        assert!(subnet
            .member_ids
            .contains("bicep:Microsoft.Network/networkInterfaces:nic"));
        assert!(!output.has_diagnostics(), "{:?}", output.diagnostics);
    }

    #[test]
    fn test_complexity_drives_spacing() {
        let options = Config::default().layout;
        let deriver = LayoutDeriver::new(&options);

        let small = DiagramComplexity::from_metrics(5, 4, 2, 1, 12, 1);
        let large = DiagramComplexity::from_metrics(50, 200, 2, 1, 12, 1);
        assert!((small.avg_edges_per_node - 0.8).abs() < f64::EPSILON);
        assert!((large.avg_edges_per_node - 4.0).abs() < f64::EPSILON);

        let small_layout = deriver.derive(&small, Direction::Horizontal);
        let large_layout = deriver.derive(&large, Direction::Horizontal);

        assert!(large.overall_score > small.overall_score);
        assert!(large_layout.node_separation > small_layout.node_separation);
        assert!(large_layout.rank_separation > small_layout.rank_separation);
    }

    #[test]
    fn test_security_edge_style() {
        let doc = tf(
            "security.tf",
            r#"
resource "aws_security_group" "web" {
  name = "web"
}

resource "aws_networkfirewall_rule_group" "allow" {
  name        = "allow-https"
  description = "guards ${aws_security_group.web.id}"
}
"#,
        );
        let output = Pipeline::new(Config::default()).run(vec![doc]).unwrap();

        let edge = find_edge(&output, "tf:aws_security_group:web", "tf:aws_networkfirewall_rule_group:allow").unwrap();
        assert_eq!(edge.style_hint, StyleHint::Security);
    }

    #[test]
    fn test_auto_direction() {
        let options = Config::default().layout;
        let deriver = LayoutDeriver::new(&options);

        let wide = DiagramComplexity::from_metrics(60, 90, 8, 1, 10, 1);
        assert_eq!(deriver.derive(&wide, Direction::Auto).direction, Direction::Horizontal);

        let tall = DiagramComplexity::from_metrics(15, 75, 3, 3, 10, 1);
        assert_eq!(deriver.derive(&tall, Direction::Auto).direction, Direction::Vertical);
    }

    #[tokio::test]
    async fn test_malformed_file_is_a_diagnostic() {
        let output = run_fixture("mixed").await;

        assert_eq!(output.files.len(), 3);
        assert_eq!(output.graph.nodes.len(), 4);
        assert_eq!(output.diagnostic_counts().get("parse_error"), Some(&1));
        assert!(output
            .graph
            .nodes
            .iter()
            .all(|n| !n.source_file.ends_with("broken.tf")));
        assert!(find_edge(&output, "tf:aws_ecr_repository:app", "tf:aws_ecs_service:app").is_some());
        assert!(find_edge(&output, "cfn:AWS::SNS::Topic:AlertsTopic", "cfn:AWS::CloudWatch::Alarm:AlertsAlarm").is_some());
    }
}

mod dialect_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_cloudformation_fixture() {
        let output = run_fixture("cloudformation").await;

        assert_eq!(output.graph.nodes.len(), 4);
        assert_eq!(output.graph.edges.len(), 3);
        assert!(!output.has_diagnostics(), "{:?}", output.diagnostics);

        let function = "cfn:AWS::Lambda::Function:IngestFunction";
        let queue = find_edge(&output, "cfn:AWS::SQS::Queue:EventsQueue", function).unwrap();
        assert_eq!(queue.kind, EdgeKind::ExplicitDependency);
        assert_eq!(queue.style_hint, StyleHint::Data);

        let bucket = find_edge(&output, "cfn:AWS::S3::Bucket:EventsBucket", function).unwrap();
        assert_eq!(bucket.kind, EdgeKind::AttributeReference);

        let role = find_edge(&output, "cfn:AWS::IAM::Role:IngestRole", function).unwrap();
        assert_eq!(role.kind, EdgeKind::AttributeReference);
        assert_eq!(role.style_hint, StyleHint::Default);
    }

    #[tokio::test]
    async fn test_pulumi_fixture() {
        let output = run_fixture("pulumi").await;

        let ids: Vec<&str> = output.graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "pulumi:aws:s3:BucketV2:logs",
                "pulumi:aws:sqs:Queue:queue",
                "pulumi:aws:sns:Topic:topic",
            ]
        );

        let reference = find_edge(&output, "pulumi:aws:s3:BucketV2:logs", "pulumi:aws:sqs:Queue:queue").unwrap();
        assert_eq!(reference.kind, EdgeKind::AttributeReference);
        let explicit = find_edge(&output, "pulumi:aws:sqs:Queue:queue", "pulumi:aws:sns:Topic:topic").unwrap();
        assert_eq!(explicit.kind, EdgeKind::ExplicitDependency);
    }

    #[tokio::test]
    async fn test_all_fixtures_together() {
        let output = run_fixture("").await;

        let dialects: HashSet<Dialect> = output.graph.nodes.iter().map(|n| n.dialect).collect();
        assert_eq!(dialects.len(), 4);
        assert_eq!(output.diagnostic_counts().get("parse_error"), Some(&1));
        assert_graph_invariants(&output);
    }
}

mod edge_case_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn first_parse_error(output: &PipelineOutput) -> (usize, Option<usize>) {
        output
            .diagnostics
            .iter()
            .find_map(|d| match d {
                Diagnostic::ParseError { offset: Some(offset), line, .. } => Some((*offset, *line)),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_truncated_terraform_keeps_complete_blocks() {
        let output = run_docs(vec![tf(
            "main.tf",
            "resource \"aws_vpc\" \"main\" {}\n\nresource \"aws_subnet\" \"a\" {\n  vpc_id     = aws_vpc.main.id\n  cidr_block = \"10.0.",
        )]);
        assert_eq!(node_ids(&output), vec!["tf:aws_vpc:main"]);
        assert_eq!(output.diagnostic_counts().get("parse_error"), Some(&1));
        assert_graph_invariants(&output);
    }

    #[test]
    fn test_truncated_cloudformation_keeps_complete_resources() {
        let content = "Resources:\n  Topic:\n    Type: AWS::SNS::Topic\n  Alarm:\n    Type: AWS::CloudWatch::Alarm\n    Properties:\n      AlarmActions:\n        - Ref: Topic\n      Dimensions: [{Name: QueueName, Value: \"jobs\n";
        let output = run_docs(vec![SourceDocument::new("alarms.yaml", Dialect::CloudFormation, content)]);

        assert_eq!(
            node_ids(&output),
            vec!["cfn:AWS::SNS::Topic:Topic", "cfn:AWS::CloudWatch::Alarm:Alarm"]
        );
        assert!(find_edge(&output, "cfn:AWS::SNS::Topic:Topic", "cfn:AWS::CloudWatch::Alarm:Alarm").is_some());
        assert_eq!(output.diagnostic_counts().get("parse_error"), Some(&1));
    }

    #[test]
    fn test_truncated_bicep_keeps_partial_resource() {
        let content = "resource vnet 'Microsoft.Network/virtualNetworks@2023-04-01' = {\n  name: 'hub'\n  resource app 'subnets' = {\n    name: 'app'\n  }\n}\n\nresource nic 'Microsoft.Network/networkInterfaces@2023-04-01' = {\n  name: 'nic-web'\n  properties: {\n    subnet: {\n      id: vnet::app.id\n    }\n    privateIPAllocationMethod: 'Dyn";
        let output = run_docs(vec![SourceDocument::new("main.bicep", Dialect::Bicep, content)]);

        assert!(node_ids(&output).contains(&"bicep:Microsoft.Network/networkInterfaces:nic"));
        assert!(find_edge(
            &output,
            "bicep:Microsoft.Network/virtualNetworks/subnets:app",
            "bicep:Microsoft.Network/networkInterfaces:nic"
        )
        .is_some());
        assert_eq!(output.diagnostic_counts().get("parse_error"), Some(&1));
        assert_eq!(first_parse_error(&output).0, content.rfind('\'').unwrap());
        assert_graph_invariants(&output);
    }

    #[test]
    fn test_truncated_pulumi_keeps_complete_resources() {
        let content = "name: app\nruntime: yaml\nresources:\n  logs:\n    type: aws:s3:BucketV2\n  queue:\n    type: aws:sqs:Queue\n    properties:\n      name: ${logs.bucket}-events\n      tags: {Name: \"q";
        let output = run_docs(vec![SourceDocument::new("Pulumi.yaml", Dialect::PulumiYaml, content)]);

        assert_eq!(
            node_ids(&output),
            vec!["pulumi:aws:s3:BucketV2:logs", "pulumi:aws:sqs:Queue:queue"]
        );
        assert!(find_edge(&output, "pulumi:aws:s3:BucketV2:logs", "pulumi:aws:sqs:Queue:queue").is_some());
        assert_eq!(output.diagnostic_counts().get("parse_error"), Some(&1));
    }

    #[test]
    fn test_crlf_parse_error_offset_points_into_file() {
        let lf = "resource \"aws_vpc\" \"main\" {}\n\nresource \"aws_subnet\" \"bad\" {\n  cidr_block = = \"10.0.1.0/24\"\n}\n";
        let crlf = lf.replace('\n', "\r\n");

        let (lf_offset, lf_line) = first_parse_error(&run_docs(vec![tf("main.tf", lf)]));
        let (crlf_offset, crlf_line) = first_parse_error(&run_docs(vec![tf("main.tf", &crlf)]));

        assert!(crlf_offset <= crlf.len());
        assert!(crlf.is_char_boundary(crlf_offset));
        assert_eq!(crlf[..crlf_offset].replace("\r\n", "\n"), lf[..lf_offset]);
        assert_eq!(crlf_line, lf_line);
    }

    #[test]
    fn test_cloudformation_logical_names_stay_in_their_template() {
        let alarms = "Resources:\n  Notifications:\n    Type: AWS::SNS::Topic\n  Alarm:\n    Type: AWS::CloudWatch::Alarm\n    Properties:\n      AlarmActions: [!Ref Notifications]\n";
        let workers = "Resources:\n  Notifications:\n    Type: AWS::SQS::Queue\n  Consumer:\n    Type: AWS::Lambda::Function\n    Properties:\n      Environment:\n        Variables:\n          QUEUE: !Ref Notifications\n";
        let output = run_docs(vec![
            SourceDocument::new("alarms.yaml", Dialect::CloudFormation, alarms),
            SourceDocument::new("workers.yaml", Dialect::CloudFormation, workers),
        ]);

        assert!(find_edge(&output, "cfn:AWS::SNS::Topic:Notifications", "cfn:AWS::CloudWatch::Alarm:Alarm").is_some());
        assert!(find_edge(&output, "cfn:AWS::SQS::Queue:Notifications", "cfn:AWS::Lambda::Function:Consumer").is_some());
        assert_eq!(output.graph.edges.len(), 2);
        assert!(!output.has_diagnostics(), "{:?}", output.diagnostics);
    }

    #[test]
    fn test_bicep_multibyte_escape() {
        let content = "resource site 'Microsoft.Web/sites@2022-03-01' = {\n  name: '\\é-app'\n  kind: '\\ü'\n}\n\nresource plan 'Microsoft.Web/serverfarms@2022-03-01' = {\n  name: 'plan-\\\\\u{1F680}'\n}\n";
        let output = run_docs(vec![SourceDocument::new("web.bicep", Dialect::Bicep, content)]);

        assert_eq!(output.graph.nodes.len(), 2);
        let site = output.graph.nodes.iter().find(|n| n.logical_name == "site").unwrap();
        assert_eq!(site.attributes["name"].as_str(), Some("é-app"));
        assert_eq!(site.attributes["kind"].as_str(), Some("ü"));
        assert!(!output.has_diagnostics(), "{:?}", output.diagnostics);
    }

    #[test]
    fn test_three_deep_subnet_chain_collapses() {
        let output = run_docs(vec![tf(
            "network.tf",
            r#"
resource "azurerm_virtual_network" "hub" {
  name = "hub"
}

resource "azurerm_subnet" "z_outer" {
  virtual_network_name = azurerm_virtual_network.hub.name
}

resource "azurerm_subnet" "m_middle" {
  address_prefixes = [azurerm_subnet.z_outer.address_prefixes[0]]
}

resource "azurerm_subnet" "a_inner" {
  address_prefixes = [azurerm_subnet.m_middle.address_prefixes[0]]
}
"#,
        )]);

        for subnet in ["z_outer", "m_middle", "a_inner"] {
            let cluster = output
                .graph
                .clusters
                .iter()
                .find(|c| c.id == format!("network:tf:azurerm_subnet:{subnet}"))
                .unwrap();
            assert_eq!(cluster.parent.as_deref(), Some("network:tf:azurerm_virtual_network:hub"), "{subnet}");
        }
        assert_eq!(output.complexity.max_cluster_depth, 2);
        assert_graph_invariants(&output);
    }

    #[test]
    fn test_environments_and_local_modules() {
        let docs = vec![
            tf("environments/prod/main.tf", "module \"queue\" {\n  source = \"../../modules/queue\"\n}\n"),
            tf("environments/dev/main.tf", "module \"queue\" {\n  source = \"../../modules/queue\"\n}\n"),
            tf(
                "modules/queue/main.tf",
                "resource \"aws_sqs_queue\" \"dlq\" {}\nresource \"aws_sqs_queue\" \"main\" {\n  redrive_policy = aws_sqs_queue.dlq.arn\n}\n",
            ),
        ];
        let output = run_docs(docs);

        // Both calls share one address, so the instances merge.
        assert_eq!(
            node_ids(&output),
            vec!["tf:aws_sqs_queue:module.queue.dlq", "tf:aws_sqs_queue:module.queue.main"]
        );
        assert!(find_edge(&output, "tf:aws_sqs_queue:module.queue.dlq", "tf:aws_sqs_queue:module.queue.main").is_some());
        assert!(output.graph.nodes.iter().all(|n| n.module.as_deref() == Some("queue")));
        assert!(!output.has_diagnostics(), "{:?}", output.diagnostics);
        assert_graph_invariants(&output);
    }

    #[test]
    fn test_environment_clusters_and_subnet_visibility() {
        let docs = vec![
            tf(
                "environments/prod/network.tf",
                "resource \"aws_vpc\" \"prod\" {}\nresource \"aws_subnet\" \"public_a\" {\n  vpc_id = aws_vpc.prod.id\n}\n",
            ),
            tf(
                "environments/staging/network.tf",
                "resource \"aws_vpc\" \"staging\" {}\nresource \"aws_subnet\" \"app\" {\n  vpc_id                  = aws_vpc.staging.id\n  map_public_ip_on_launch = false\n}\n",
            ),
            tf("global/dns.tf", "resource \"aws_route53_zone\" \"main\" {}\n"),
        ];
        let output = run_docs(docs);

        let environments: Vec<(&str, &str)> = output
            .graph
            .clusters
            .iter()
            .filter(|c| c.kind == ClusterKind::Environment)
            .map(|c| (c.id.as_str(), c.label.as_str()))
            .collect();
        assert_eq!(
            environments,
            vec![("env:prod", "Prod"), ("env:shared", "Shared"), ("env:staging", "Staging")]
        );

        let label = |id: &str| output.graph.clusters.iter().find(|c| c.id == id).map(|c| c.label.as_str());
        assert_eq!(label("network:tf:aws_subnet:public_a"), Some("public_a (Public)"));
        assert_eq!(label("network:tf:aws_subnet:app"), Some("app (Private)"));
        assert_graph_invariants(&output);
    }
}

mod property_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_invariants_hold_for_every_fixture() {
        for name in ["terraform", "cloudformation", "bicep", "pulumi", "mixed"] {
            assert_graph_invariants(&run_fixture(name).await);
        }
    }

    #[tokio::test]
    async fn test_determinism() {
        let first = run_fixture("").await;
        let second = run_fixture("").await;

        let export = |output: &PipelineOutput| {
            iacmap::graph::export_graph(&output.graph, iacmap::GraphFormat::Json, ClusterKind::Category).unwrap()
        };
        assert_eq!(export(&first), export(&second));
        assert_eq!(first.diagnostics, second.diagnostics);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let docs = vec![
            tf("b.tf", "resource \"aws_vpc\" \"main\" { tags = { Name = \"b\" } }\n"),
            tf("a.tf", "resource \"aws_vpc\" \"main\" { tags = { Name = \"a\" } }\nresource \"aws_subnet\" \"x\" { vpc_id = aws_vpc.main.id }\n"),
        ];
        let mut reversed = docs.clone();
        reversed.reverse();

        let pipeline = Pipeline::new(Config::default());
        let forward = pipeline.run(docs).unwrap();
        let backward = pipeline.run(reversed).unwrap();

        let json = |o: &PipelineOutput| serde_json::to_string(&o.graph).unwrap();
        assert_eq!(json(&forward), json(&backward));

        // Last writer in path order wins
        let vpc = forward.graph.nodes.iter().find(|n| n.id == "tf:aws_vpc:main").unwrap();
        assert_eq!(vpc.display_name, "b");
    }

    #[test]
    fn test_monotonicity() {
        let options = Config::default().layout;
        let deriver = LayoutDeriver::new(&options);

        let mut previous: Option<(f64, f64, f64, f64)> = None;
        for nodes in [1usize, 5, 10, 25, 50, 80] {
            let c = DiagramComplexity::from_metrics(nodes, nodes * 2, 4, 2, 20, 2);
            let p = deriver.derive(&c, Direction::Vertical);
            let current = (c.overall_score, p.pad, p.node_separation, p.rank_separation);
            if let Some(prev) = previous {
                assert!(current.0 >= prev.0 && current.1 >= prev.1 && current.2 >= prev.2 && current.3 >= prev.3);
            }
            previous = Some(current);
        }

        let mut previous: Option<(f64, f64, f64, f64)> = None;
        for edges in [0usize, 10, 20, 40, 60, 100] {
            let c = DiagramComplexity::from_metrics(20, edges, 4, 2, 20, 2);
            let p = deriver.derive(&c, Direction::Horizontal);
            let current = (c.overall_score, p.pad, p.node_separation, p.rank_separation);
            if let Some(prev) = previous {
                assert!(current.0 >= prev.0 && current.1 >= prev.1 && current.2 >= prev.2 && current.3 >= prev.3);
            }
            previous = Some(current);
        }
    }

    #[test]
    fn test_duplicate_declarations_merge() {
        let docs = vec![
            tf(
                "a.tf",
                "resource \"aws_subnet\" \"a\" {}\nresource \"aws_instance\" \"web\" { subnet_id = aws_subnet.a.id }\n",
            ),
            tf(
                "b.tf",
                "resource \"aws_subnet\" \"b\" {}\nresource \"aws_instance\" \"web\" { subnet_id = aws_subnet.b.id }\n",
            ),
        ];
        let output = Pipeline::new(Config::default()).run(docs).unwrap();

        let web: Vec<_> = output.graph.nodes.iter().filter(|n| n.id == "tf:aws_instance:web").collect();
        assert_eq!(web.len(), 1);
        assert_eq!(output.graph.nodes.len(), 3);
        assert!(find_edge(&output, "tf:aws_subnet:a", "tf:aws_instance:web").is_some());
        assert!(find_edge(&output, "tf:aws_subnet:b", "tf:aws_instance:web").is_some());
        assert_eq!(output.graph.edges.len(), 2);
    }
}

mod loader_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_max_files_limit() {
        let mut config = Config::default();
        config.limits.max_files = 2;
        let output = Pipeline::new(config).run_paths(&[fixtures_path()]).await.unwrap();

        assert_eq!(
            output.files,
            vec![
                fixtures_path().join("bicep/main.bicep"),
                fixtures_path().join("cloudformation/template.yaml"),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_path() {
        let result = Pipeline::new(Config::default())
            .run_paths(&[fixtures_path().join("does-not-exist")])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_exclude_patterns() {
        let mut config = Config::default();
        config.scan.exclude_patterns.push("**/mixed".to_string());
        let output = Pipeline::new(config).run_paths(&[fixtures_path()]).await.unwrap();

        assert!(output.files.iter().all(|f| !f.to_string_lossy().contains("mixed")));
        assert_eq!(output.files.len(), 4);
        assert_eq!(output.diagnostic_counts().get("parse_error"), None);
    }
}

mod config_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_config_fixture() {
        let content = std::fs::read_to_string(fixtures_path().join("iacmap.yaml")).unwrap();
        let config = Config::from_yaml(&content).unwrap();
        assert_eq!(config.limits.max_files, 10);
        assert_eq!(config.layout.direction, Direction::Vertical);
        assert_eq!(config.output.cluster_view, ClusterKind::NetworkContainer);

        let output = Pipeline::new(config)
            .run_paths(&[fixtures_path().join("terraform")])
            .await
            .unwrap();
        assert_eq!(output.graph.layout.direction, Direction::Vertical);
        assert_eq!(
            output.graph.icon_hints.get("tf:aws_instance:web").map(String::as_str),
            Some("ec2")
        );
    }

    #[test]
    fn test_implicit_ordering_toggle() {
        let docs = || {
            vec![tf(
                "main.tf",
                "resource \"aws_s3_bucket\" \"a\" {}\nresource \"aws_s3_bucket\" \"b\" {}\nresource \"aws_s3_bucket\" \"c\" {}\n",
            )]
        };

        let output = Pipeline::new(Config::default()).run(docs()).unwrap();
        assert_eq!(output.graph.edges.len(), 2);
        assert!(output.graph.edges.iter().all(|e| e.kind == EdgeKind::ImplicitOrdering));

        let mut config = Config::default();
        config.graph.implicit_ordering = false;
        let output = Pipeline::new(config).run(docs()).unwrap();
        assert!(output.graph.edges.is_empty());
    }
}

mod cli_tests {
    use super::*;
    use assert_cmd::Command;
    use predicates::prelude::*;

    fn iacmap() -> Command {
        let mut cmd = Command::cargo_bin("iacmap").unwrap();
        cmd.env_remove("IACMAP_CONFIG").env_remove("RUST_LOG");
        cmd
    }

    #[test]
    fn test_graph_mermaid() {
        iacmap()
            .args(["graph", "--format", "mermaid", "--direction", "vertical", "--cluster-view", "network"])
            .arg(fixtures_path().join("terraform"))
            .assert()
            .success()
            .stdout(predicate::str::starts_with("flowchart TB"))
            .stdout(predicate::str::contains("subgraph"));
    }

    #[test]
    fn test_graph_dot() {
        iacmap()
            .args(["graph", "-d", "lr"])
            .arg(fixtures_path().join("bicep"))
            .assert()
            .success()
            .stdout(predicate::str::contains("digraph IacMap {"))
            .stdout(predicate::str::contains("rankdir=LR;"));
    }

    #[test]
    fn test_report_json() {
        let output = iacmap()
            .args(["report", "--format", "json"])
            .arg(fixtures_path().join("cloudformation"))
            .output()
            .unwrap();
        assert!(output.status.success());

        let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(report["summary"]["total_nodes"], 4);
        assert_eq!(report["summary"]["has_diagnostics"], false);
    }

    #[test]
    fn test_strict_report_fails_on_diagnostics() {
        iacmap()
            .args(["report", "--strict"])
            .arg(fixtures_path().join("mixed"))
            .assert()
            .code(1)
            .stdout(predicate::str::contains("COMPLETED with diagnostics"));
    }

    #[test]
    fn test_validate_config() {
        iacmap()
            .arg("validate")
            .arg(fixtures_path().join("iacmap.yaml"))
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid"));
    }

    #[test]
    fn test_missing_input_fails() {
        iacmap()
            .args(["graph", "/nonexistent/infra"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error"));
    }
}
