/// Facts pulled out of a deployment manifest for the diagram pane.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestFacts {
    pub name: String,
    pub namespace: String,
    pub replicas: String,
    pub selector: Vec<(String, String)>,
    pub images: Vec<String>,
    pub ports: Vec<String>,
    pub cpu_limit: Option<String>,
    pub memory_limit: Option<String>,
}

/// Parser position inside the manifest. Transitions are driven by the
/// line content plus its indent, never by bare prefix guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Metadata,
    Spec,
    Selector,
    MatchLabels,
    Containers,
    Ports,
    Resources,
}

/// Extracts deployment facts from manifest text with a line-oriented
/// state machine. Unknown sections are skipped; missing fields stay at
/// their defaults so a partial manifest still renders.
pub fn parse_manifest(yaml: &str) -> ManifestFacts {
    let mut facts = ManifestFacts::default();
    let mut section = Section::Root;
    let mut section_indent = 0usize;

    for raw in yaml.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = raw.len() - raw.trim_start().len();

        // Leaving a nested section when indentation falls back.
        while section != Section::Root && indent < section_indent {
            section = match section {
                Section::MatchLabels => Section::Selector,
                Section::Selector => Section::Spec,
                Section::Ports | Section::Resources => Section::Containers,
                Section::Containers => Section::Spec,
                Section::Metadata | Section::Spec | Section::Root => Section::Root,
            };
            section_indent = section_indent.saturating_sub(2);
        }

        match section {
            Section::Root => {
                if indent == 0 && trimmed == "metadata:" {
                    section = Section::Metadata;
                    section_indent = 2;
                } else if indent == 0 && trimmed == "spec:" {
                    section = Section::Spec;
                    section_indent = 2;
                }
            }
            Section::Metadata => {
                if indent == 0 {
                    section = Section::Root;
                    if trimmed == "spec:" {
                        section = Section::Spec;
                        section_indent = 2;
                    }
                } else if let Some(value) = scalar_value(trimmed, "name") {
                    if facts.name.is_empty() {
                        facts.name = value;
                    }
                } else if let Some(value) = scalar_value(trimmed, "namespace") {
                    facts.namespace = value;
                }
            }
            Section::Spec => {
                if indent == 0 {
                    section = Section::Root;
                    continue;
                }
                if let Some(value) = scalar_value(trimmed, "replicas") {
                    if facts.replicas.is_empty() {
                        facts.replicas = value;
                    }
                } else if trimmed == "selector:" {
                    section = Section::Selector;
                    section_indent = indent + 2;
                } else if trimmed == "containers:" {
                    section = Section::Containers;
                    section_indent = indent + 2;
                }
            }
            Section::Selector => {
                if trimmed == "matchLabels:" {
                    section = Section::MatchLabels;
                    section_indent = indent + 2;
                }
            }
            Section::MatchLabels => {
                if let Some((key, value)) = trimmed.split_once(':') {
                    let value = value.trim().trim_matches(['"', '\'']);
                    if !value.is_empty() {
                        facts
                            .selector
                            .push((key.trim().to_string(), value.to_string()));
                    }
                }
            }
            Section::Containers => {
                if let Some(value) = scalar_value(trimmed.trim_start_matches("- "), "image") {
                    facts.images.push(value);
                } else if trimmed == "ports:" {
                    section = Section::Ports;
                    section_indent = indent + 2;
                } else if trimmed == "resources:" || trimmed == "limits:" {
                    section = Section::Resources;
                    section_indent = indent + 2;
                }
            }
            Section::Ports => {
                if let Some(value) = scalar_value(trimmed.trim_start_matches("- "), "containerPort")
                {
                    facts.ports.push(value);
                } else if trimmed.ends_with(':') {
                    section = Section::Containers;
                }
            }
            Section::Resources => {
                if trimmed == "limits:" {
                    // Stay here; requests/limits share the same keys.
                } else if let Some(value) = scalar_value(trimmed, "cpu") {
                    facts.cpu_limit.get_or_insert(value);
                } else if let Some(value) = scalar_value(trimmed, "memory") {
                    facts.memory_limit.get_or_insert(value);
                }
            }
        }
    }

    facts
}

/// Renders the ownership chain as a fixed-width flowchart plus a spec
/// summary.
pub fn render(facts: &ManifestFacts) -> String {
    let name = non_empty(&facts.name);
    let namespace = non_empty(&facts.namespace);
    let replicas = if facts.replicas.is_empty() {
        "1"
    } else {
        &facts.replicas
    };
    let selector = if facts.selector.is_empty() {
        "-".to_string()
    } else {
        facts
            .selector
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let images = if facts.images.is_empty() {
        "-".to_string()
    } else {
        facts.images.join(", ")
    };
    let ports = if facts.ports.is_empty() {
        "-".to_string()
    } else {
        facts.ports.join(", ")
    };
    let limits = match (&facts.cpu_limit, &facts.memory_limit) {
        (Some(cpu), Some(memory)) => format!("cpu {cpu}, memory {memory}"),
        (Some(cpu), None) => format!("cpu {cpu}"),
        (None, Some(memory)) => format!("memory {memory}"),
        (None, None) => "not specified".to_string(),
    };

    let mut out = String::new();
    push_box(&mut out, "Deployment", &[
        format!("name:      {name}"),
        format!("namespace: {namespace}"),
        format!("replicas:  {replicas}"),
        format!("selector:  {selector}"),
    ]);
    push_arrow(&mut out, "creates");
    push_box(&mut out, "ReplicaSet", &[
        format!("keeps {replicas} pod(s) running"),
        format!("matches:   {selector}"),
    ]);
    push_arrow(&mut out, "manages");
    push_box(&mut out, &format!("Pod(s) x{replicas}"), &[
        format!("image(s):  {images}"),
        format!("ports:     {ports}"),
        format!("limits:    {limits}"),
    ]);

    out.push('\n');
    out.push_str("Objects created:\n");
    out.push_str(&format!("  1. Deployment {namespace}/{name}\n"));
    out.push_str(&format!("  2. ReplicaSet {name}-xxxxxxxxxx\n"));
    out.push_str(&format!(
        "  3. Pods {name}-xxxxxxxxxx-yyyyy (count: {replicas})\n"
    ));
    out
}

const BOX_WIDTH: usize = 64;

fn push_box(out: &mut String, title: &str, lines: &[String]) {
    out.push_str(&format!("┌{}┐\n", "─".repeat(BOX_WIDTH)));
    out.push_str(&format!("│ {:<width$} │\n", title, width = BOX_WIDTH - 2));
    out.push_str(&format!("├{}┤\n", "─".repeat(BOX_WIDTH)));
    for line in lines {
        let clipped = clip(line, BOX_WIDTH - 2);
        out.push_str(&format!("│ {clipped:<width$} │\n", width = BOX_WIDTH - 2));
    }
    out.push_str(&format!("└{}┘\n", "─".repeat(BOX_WIDTH)));
}

fn push_arrow(out: &mut String, label: &str) {
    let pad = " ".repeat(BOX_WIDTH / 2);
    out.push_str(&format!("{pad}│\n"));
    out.push_str(&format!("{pad}{label}\n"));
    out.push_str(&format!("{pad}▼\n"));
}

fn clip(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let mut out = value.chars().take(max.saturating_sub(1)).collect::<String>();
    out.push('…');
    out
}

fn non_empty(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

fn scalar_value(line: &str, key: &str) -> Option<String> {
    let rest = line.strip_prefix(key)?.strip_prefix(':')?;
    let value = rest.trim().trim_matches(['"', '\'']);
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_manifest, render};

    const MANIFEST: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: shop
spec:
  replicas: 3
  selector:
    matchLabels:
      app: web
      tier: frontend
  template:
    spec:
      containers:
        - name: web
          image: nginx:1.27
          ports:
            - containerPort: 8080
            - containerPort: 8443
          resources:
            limits:
              cpu: 500m
              memory: 256Mi
";

    #[test]
    fn parser_collects_deployment_facts() {
        let facts = parse_manifest(MANIFEST);
        assert_eq!(facts.name, "web");
        assert_eq!(facts.namespace, "shop");
        assert_eq!(facts.replicas, "3");
        assert_eq!(
            facts.selector,
            vec![
                ("app".to_string(), "web".to_string()),
                ("tier".to_string(), "frontend".to_string()),
            ]
        );
        assert_eq!(facts.images, vec!["nginx:1.27"]);
        assert_eq!(facts.ports, vec!["8080", "8443"]);
        assert_eq!(facts.cpu_limit.as_deref(), Some("500m"));
        assert_eq!(facts.memory_limit.as_deref(), Some("256Mi"));
    }

    #[test]
    fn template_metadata_does_not_override_deployment_name() {
        let manifest = "\
metadata:
  name: real-name
spec:
  replicas: 2
  template:
    metadata:
      name: template-name
";
        let facts = parse_manifest(manifest);
        assert_eq!(facts.name, "real-name");
        assert_eq!(facts.replicas, "2");
    }

    #[test]
    fn empty_manifest_renders_with_defaults() {
        let facts = parse_manifest("");
        let diagram = render(&facts);
        assert!(diagram.contains("Deployment"));
        assert!(diagram.contains("replicas:  1"));
        assert!(diagram.contains("limits:    not specified"));
    }

    #[test]
    fn render_shows_ownership_chain() {
        let facts = parse_manifest(MANIFEST);
        let diagram = render(&facts);
        assert!(diagram.contains("creates"));
        assert!(diagram.contains("manages"));
        assert!(diagram.contains("ReplicaSet"));
        assert!(diagram.contains("nginx:1.27"));
        assert!(diagram.contains("Deployment shop/web"));
        assert!(diagram.contains("count: 3"));
    }

    #[test]
    fn quoted_scalars_are_unwrapped() {
        let manifest = "metadata:\n  name: \"quoted\"\n";
        assert_eq!(parse_manifest(manifest).name, "quoted");
    }
}
