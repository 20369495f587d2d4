use crate::ir::{AstNode, Language, NodeKind, Role};
use crate::rules::context::root_identifier;
use crate::rules::{MatchSite, Rule, RuleContext, RuleMetadata, Severity, ECMASCRIPT};

/// F091: HTTP header injection
///
/// Flags response headers set from request data that was not
/// newline-stripped: `res.setHeader`, `res.set`, `res.header`, `res.append`
/// calls, and `response.headers[...] = …` assignments.
pub struct HeaderInjectionRule;

const RESPONSES: &[&str] = &["res", "resp", "response"];

const HEADER_SETTERS: &[&str] = &["setHeader", "set", "header", "append"];

impl Rule for HeaderInjectionRule {
    fn metadata(&self) -> RuleMetadata {
        let mut languages = ECMASCRIPT.to_vec();
        languages.extend([Language::Python, Language::Java]);
        RuleMetadata {
            id: "f091.header_injection".into(),
            finding: "F091".into(),
            name: "HTTP header injection".into(),
            description: "User input placed in a response header without stripping CR/LF allows \
                          response splitting"
                .into(),
            default_severity: Severity::Medium,
            cwe_id: Some("CWE-113".into()),
            languages,
            remediation: Some(
                "Reject or strip \\r and \\n from header values, or encode them before use.".into(),
            ),
        }
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<MatchSite> {
        let mut sites = Vec::new();

        for call in ctx.calls() {
            let Some(method) = ctx.method(call) else {
                continue;
            };
            if !HEADER_SETTERS.contains(&method) || !on_response(ctx.receiver(call)) {
                continue;
            }
            let tainted = ctx
                .call_args(call)
                .into_iter()
                .find(|arg| ctx.is_user_input(arg));
            if let Some(value) = tainted {
                sites.push(header_site(ctx, call, value));
            }
        }

        for assignment in ctx.ast.nodes_of_kind(&NodeKind::Assignment) {
            let (Some(target), Some(value)) = (
                assignment.child(Role::Left),
                assignment.child(Role::Right),
            ) else {
                continue;
            };
            if is_header_slot(target) && ctx.is_user_input(value) {
                sites.push(header_site(ctx, assignment, value));
            }
        }

        sites
    }
}

fn header_site(ctx: &RuleContext<'_>, node: &AstNode, value: &AstNode) -> MatchSite {
    MatchSite::new(
        node.span,
        "User input written to a response header without newline stripping",
    )
    .with_note(ctx.text(value).to_string())
}

fn on_response(receiver: Option<&AstNode>) -> bool {
    receiver
        .and_then(root_identifier)
        .and_then(AstNode::name)
        .is_some_and(|name| RESPONSES.contains(&name))
}

/// `response.headers["X"]`
fn is_header_slot(target: &AstNode) -> bool {
    target.kind == NodeKind::Subscript
        && target
            .child(Role::Object)
            .filter(|o| o.attr("property") == Some("headers"))
            .is_some_and(|headers| on_response(Some(headers)))
}
