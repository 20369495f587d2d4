use crate::ir::{AstNode, Language};
use crate::rules::context::root_identifier;
use crate::rules::{MatchSite, Rule, RuleContext, RuleMetadata, Severity, ECMASCRIPT};

/// F091: Log injection
///
/// Flags log calls (`console.*`, `logger.*`, `log.*`, `logging.*`) with an
/// argument carrying request data that was neither newline-stripped nor
/// passed through a sanitizer.
pub struct LogInjectionRule;

const LOGGERS: &[&str] = &["console", "logger", "log", "logging"];

const LOG_METHODS: &[&str] = &[
    "log",
    "trace",
    "debug",
    "info",
    "warn",
    "warning",
    "error",
    "fatal",
    "critical",
    "exception",
];

impl Rule for LogInjectionRule {
    fn metadata(&self) -> RuleMetadata {
        let mut languages = ECMASCRIPT.to_vec();
        languages.extend([Language::Python, Language::Java]);
        RuleMetadata {
            id: "f091.log_injection".into(),
            finding: "F091".into(),
            name: "Log injection".into(),
            description: "User input written to logs without stripping line breaks lets an \
                          attacker forge log entries"
                .into(),
            default_severity: Severity::Low,
            cwe_id: Some("CWE-117".into()),
            languages,
            remediation: Some(
                "Strip CR/LF from user input before logging it (replace(/[\\r\\n]/g, '')), or \
                 use structured logging fields."
                    .into(),
            ),
        }
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<MatchSite> {
        ctx.calls()
            .into_iter()
            .filter(|call| is_log_call(ctx, call))
            .filter_map(|call| {
                let tainted = ctx
                    .call_args(call)
                    .into_iter()
                    .find(|arg| ctx.is_user_input(arg))?;
                let callee = ctx.callee(call).unwrap_or("log");
                Some(
                    MatchSite::new(
                        call.span,
                        format!("User input reaches {callee} without newline stripping"),
                    )
                    .with_note(ctx.text(tainted).to_string()),
                )
            })
            .collect()
    }
}

fn is_log_call<'a>(ctx: &RuleContext<'a>, call: &'a AstNode) -> bool {
    let Some(method) = ctx.method(call) else {
        return false;
    };
    if !LOG_METHODS.contains(&method) {
        return false;
    }
    // The receiver's last segment names the logger: `console`, `app.logger`.
    let Some(receiver) = ctx.receiver(call) else {
        return false;
    };
    let name = match receiver.attr("property") {
        Some(property) => Some(property),
        None => root_identifier(receiver).and_then(AstNode::name),
    };
    name.is_some_and(|n| LOGGERS.iter().any(|l| l.eq_ignore_ascii_case(n)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "javascript")]
    #[test]
    fn express_request_data_in_logs() {
        use crate::rules::testing::lines;
        let src = r#"app.get('/login', (req, res) => {
    const user = req.body.username;
    console.log('login attempt for ' + user);
    logger.info(`agent ${req.headers['user-agent']}`);
    console.log('clean ' + user.replace(/[\r\n]/g, ''));
    console.log('encoded', encodeURIComponent(req.query.q));
    console.log('static message');
    console.log(req.app.name);
});
"#;
        assert_eq!(lines(&LogInjectionRule, Language::JavaScript, src), vec![3, 4]);
    }

    #[cfg(feature = "python")]
    #[test]
    fn flask_request_data_in_logs() {
        use crate::rules::testing::lines;
        let src = r#"import logging, re
def view():
    name = request.args.get("name")
    logging.info("user %s", name)
    app.logger.warning(request.form["comment"])
    logging.info("user %s", re.sub(r"[\r\n]", "", name))
    logging.info("ok")
"#;
        assert_eq!(lines(&LogInjectionRule, Language::Python, src), vec![4, 5]);
    }

    #[cfg(feature = "java")]
    #[test]
    fn servlet_parameters_in_logs() {
        use crate::rules::testing::lines;
        let src = r#"class Handler {
    void handle(HttpServletRequest request) {
        String name = request.getParameter("name");
        LOGGER.info("user " + name);
        LOGGER.info("fixed");
    }
}
"#;
        assert_eq!(lines(&LogInjectionRule, Language::Java, src), vec![4]);
    }
}
