//! Markdown description for integration pull requests.

use std::path::PathBuf;

use crate::image::ImageRef;
use crate::manifest::{IntegrationEntry, ServiceSpecEntry};

/// Everything the pull request description is rendered from.
#[derive(Debug, Clone, Copy)]
pub struct PrBodyContext<'a> {
    pub image: &'a ImageRef,
    pub entry: &'a IntegrationEntry,
    /// Files reported missing while applying `entry`.
    pub missing_files: &'a [PathBuf],
    pub triggering_pr: Option<&'a str>,
}

fn is_missing(spec: &ServiceSpecEntry, missing: &[PathBuf]) -> bool {
    missing.iter().any(|p| p.as_os_str() == spec.file.as_str())
}

fn push_service_spec(out: &mut String, spec: &ServiceSpecEntry) {
    out.push_str(&format!("- `{}`\n", spec.file));
    if let Some(user) = &spec.user {
        out.push_str(&format!("  - user: `{}` = `{}`\n", user.path, user.value));
    }
    if let Some(command) = &spec.command {
        out.push_str(&format!("  - command: `{}` = `{}`\n", command.path, command.value));
    }
}

/// Render the pull request description.
pub fn render_pr_body(ctx: &PrBodyContext<'_>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "This pull request integrates the image `{}`.\n\n",
        ctx.image
    ));
    if let Some(url) = ctx.triggering_pr {
        out.push_str(&format!("Triggered by {url}\n\n"));
    }

    out.push_str("## Image replacements\n");
    for replace in &ctx.entry.replace_image {
        out.push_str(&format!("- `{}`: `{}`\n", replace.file, replace.path));
    }

    let (skipped, applied): (Vec<&ServiceSpecEntry>, Vec<&ServiceSpecEntry>) = ctx
        .entry
        .service_spec
        .iter()
        .partition(|spec| is_missing(spec, ctx.missing_files));

    if !applied.is_empty() {
        out.push_str("\n## Service spec updates\n");
        for spec in applied {
            push_service_spec(&mut out, spec);
        }
    }

    if !skipped.is_empty() {
        out.push_str("\n## Skipped service spec updates\n");
        out.push_str("These files were not found in the repository:\n");
        for spec in skipped {
            push_service_spec(&mut out, spec);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{PathValue, ReplaceImageEntry};

    fn entry() -> IntegrationEntry {
        IntegrationEntry {
            consumer_repository: "https://github.com/org/consumer".to_string(),
            replace_image: vec![ReplaceImageEntry {
                file: "metadata.yaml".to_string(),
                path: "resources.oci-image.upstream-source".to_string(),
            }],
            service_spec: vec![
                ServiceSpecEntry {
                    file: "svc.json".to_string(),
                    user: Some(PathValue {
                        path: "user".to_string(),
                        value: "_daemon_".to_string(),
                    }),
                    command: None,
                },
                ServiceSpecEntry {
                    file: "gone.yaml".to_string(),
                    user: None,
                    command: Some(PathValue {
                        path: "command".to_string(),
                        value: "run".to_string(),
                    }),
                },
            ],
        }
    }

    #[test]
    fn markdown_render_is_stable() {
        let image = ImageRef::parse("ghcr.io/org/app:1.2").unwrap();
        let entry = entry();
        let missing = vec![PathBuf::from("gone.yaml")];
        let body = render_pr_body(&PrBodyContext {
            image: &image,
            entry: &entry,
            missing_files: &missing,
            triggering_pr: Some("https://github.com/org/app/pull/7"),
        });
        let expected = "This pull request integrates the image `ghcr.io/org/app:1.2`.\n\n\
Triggered by https://github.com/org/app/pull/7\n\n\
## Image replacements\n\
- `metadata.yaml`: `resources.oci-image.upstream-source`\n\
\n## Service spec updates\n\
- `svc.json`\n  - user: `user` = `_daemon_`\n\
\n## Skipped service spec updates\n\
These files were not found in the repository:\n\
- `gone.yaml`\n  - command: `command` = `run`\n";
        assert_eq!(body, expected);
    }

    #[test]
    fn sections_are_omitted_when_empty() {
        let image = ImageRef::parse("app:1").unwrap();
        let mut entry = entry();
        entry.service_spec.clear();
        let body = render_pr_body(&PrBodyContext {
            image: &image,
            entry: &entry,
            missing_files: &[],
            triggering_pr: None,
        });
        assert!(!body.contains("Triggered by"));
        assert!(!body.contains("Service spec"));
    }
}
