// ============================================================================
// Detector Trait - 规则处理器抽象
// ============================================================================
//
// 每条规则是一个独立的 Detector：输入一个语法节点，输出零或一个 Finding。
// Detector 之间不共享状态，同一节点可以同时触发多条规则。
//
// 匹配只看名字 (属性名 / 变量名)，不做作用域或模块解析。
// 例如任何对象的 .load() 都会同时触发 INSECURE_DESERIALIZE 和 YAML_UNSAFE_LOAD。
//
// ============================================================================

use once_cell::sync::Lazy;
use regex::Regex;

use super::syntax::{BinOperator, Call, Node, NodeKind};
use super::{Finding, LineRef, Severity};

/// 规则处理器 trait
pub trait Detector: Send + Sync {
    /// Stable rule identifier (matches `rules::definitions`)
    fn id(&self) -> &'static str;

    fn severity(&self) -> Severity;

    /// Inspect one node; `None` when the shape does not match.
    fn check(&self, node: &Node) -> Option<Finding>;

    /// Build a finding for `node` with this rule's id and severity.
    fn report(&self, node: &Node, message: String) -> Finding {
        Finding::new(self.id(), self.severity(), message, LineRef::Line(node.line))
    }
}

/// All built-in detectors, in evaluation order.
pub fn standard_detectors() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(DangerousEvalHandler),
        Box::new(SubprocessShellHandler),
        Box::new(OsSystemHandler),
        Box::new(InsecureDeserializeHandler),
        Box::new(YamlUnsafeLoadHandler),
        Box::new(HardcodedSecretHandler),
        Box::new(TlsVerifyDisabledHandler),
        Box::new(WeakHashHandler::default()),
        Box::new(OsPopenHandler),
        Box::new(InsecureTempfileHandler),
        Box::new(SqlInjectionHandler),
        Box::new(FrameworkDebugHandler),
        Box::new(DjangoDebugHandler),
        Box::new(JwtNoVerifyHandler),
        Box::new(AutoAddHostKeyHandler),
        Box::new(InsecureRandomSecretHandler),
    ]
}

/// 变量名看起来像凭据
static SECRET_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|passwd|pwd|secret|token|apikey|api_key)").expect("valid secret-name regex")
});

/// 变量名看起来像令牌/会话标识 (用于随机数规则)
static RANDOM_SECRET_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(token|secret|apikey|api_key|key|session)").expect("valid random-secret-name regex")
});

/// `(call, attribute name)` when `node` is a call to an attribute, e.g. `x.load(...)`
fn attribute_call(node: &Node) -> Option<(&Call, &str)> {
    let call = node.as_call()?;
    Some((call, call.attr_name()?))
}

/// Bare-name assignment targets, in order
fn assigned_names(targets: &[Node]) -> impl Iterator<Item = &str> {
    targets.iter().filter_map(|t| t.as_name())
}

// ============================================================================
// 代码执行 / 命令注入
// ============================================================================

/// `eval(...)` / `exec(...)`
pub struct DangerousEvalHandler;

impl Detector for DangerousEvalHandler {
    fn id(&self) -> &'static str {
        "DANGEROUS_EVAL"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn check(&self, node: &Node) -> Option<Finding> {
        let name = node.as_call()?.func_name()?;
        matches!(name, "eval" | "exec")
            .then(|| self.report(node, format!("Use of {name}() allows arbitrary code execution (RCE)")))
    }
}

/// `subprocess.Popen/call/run(..., shell=True)`
pub struct SubprocessShellHandler;

impl Detector for SubprocessShellHandler {
    fn id(&self) -> &'static str {
        "SUBPROCESS_SHELL"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn check(&self, node: &Node) -> Option<Finding> {
        let (call, attr) = attribute_call(node)?;
        (matches!(attr, "Popen" | "call" | "run") && call.has_bool_keyword("shell", true)).then(|| {
            self.report(
                node,
                "subprocess call with shell=True enables command injection".to_string(),
            )
        })
    }
}

/// `os.system(...)`; any receiver
pub struct OsSystemHandler;

impl Detector for OsSystemHandler {
    fn id(&self) -> &'static str {
        "OS_SYSTEM"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn check(&self, node: &Node) -> Option<Finding> {
        let (_, attr) = attribute_call(node)?;
        (attr == "system")
            .then(|| self.report(node, "os.system() can lead to command injection".to_string()))
    }
}

pub struct OsPopenHandler;

impl Detector for OsPopenHandler {
    fn id(&self) -> &'static str {
        "OS_POPEN"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn check(&self, node: &Node) -> Option<Finding> {
        let (_, attr) = attribute_call(node)?;
        (attr == "popen")
            .then(|| self.report(node, "os.popen() can lead to command injection".to_string()))
    }
}

// ============================================================================
// 反序列化
// ============================================================================

/// `.load(...)` / `.loads(...)` on any object
pub struct InsecureDeserializeHandler;

impl Detector for InsecureDeserializeHandler {
    fn id(&self) -> &'static str {
        "INSECURE_DESERIALIZE"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn check(&self, node: &Node) -> Option<Finding> {
        let (_, attr) = attribute_call(node)?;
        matches!(attr, "load" | "loads").then(|| {
            self.report(
                node,
                format!("pickle.{attr}() on untrusted data allows remote code execution"),
            )
        })
    }
}

/// `.load(...)` without inspecting the Loader argument
pub struct YamlUnsafeLoadHandler;

impl Detector for YamlUnsafeLoadHandler {
    fn id(&self) -> &'static str {
        "YAML_UNSAFE_LOAD"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn check(&self, node: &Node) -> Option<Finding> {
        let (_, attr) = attribute_call(node)?;
        (attr == "load").then(|| {
            self.report(
                node,
                "yaml.load() without SafeLoader can construct arbitrary objects".to_string(),
            )
        })
    }
}

// ============================================================================
// 凭据 / 随机数
// ============================================================================

/// `password = "..."`: string literal bound to a credential-like name
pub struct HardcodedSecretHandler;

impl Detector for HardcodedSecretHandler {
    fn id(&self) -> &'static str {
        "HARDCODED_SECRET"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn check(&self, node: &Node) -> Option<Finding> {
        let NodeKind::Assign { targets, value } = &node.kind else {
            return None;
        };
        value.as_str_constant()?;

        let name = assigned_names(targets).find(|name| SECRET_NAME_REGEX.is_match(name))?;
        Some(self.report(node, format!("Hardcoded secret in variable '{name}'")))
    }
}

/// `token = random.choice(...)`: non-cryptographic RNG feeding a secret
pub struct InsecureRandomSecretHandler;

impl InsecureRandomSecretHandler {
    const RANDOM_FUNCTIONS: &'static [&'static str] = &["random", "randint", "choice", "choices"];
}

impl Detector for InsecureRandomSecretHandler {
    fn id(&self) -> &'static str {
        "INSECURE_RANDOM_SECRET"
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn check(&self, node: &Node) -> Option<Finding> {
        let NodeKind::Assign { targets, value } = &node.kind else {
            return None;
        };
        let (receiver, attr) = value.as_call()?.func.as_attribute()?;
        if !Self::RANDOM_FUNCTIONS.contains(&attr) || receiver.as_name() != Some("random") {
            return None;
        }

        let name = assigned_names(targets).find(|name| RANDOM_SECRET_NAME_REGEX.is_match(name))?;
        Some(self.report(
            node,
            format!("random used to generate '{name}' is not safe for security purposes; use the secrets module"),
        ))
    }
}

// ============================================================================
// 传输 / 加密
// ============================================================================

/// `requests.get/post/put/delete(..., verify=False)`
pub struct TlsVerifyDisabledHandler;

impl Detector for TlsVerifyDisabledHandler {
    fn id(&self) -> &'static str {
        "TLS_VERIFY_DISABLED"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn check(&self, node: &Node) -> Option<Finding> {
        let (call, attr) = attribute_call(node)?;
        (matches!(attr, "get" | "post" | "put" | "delete") && call.has_bool_keyword("verify", false)).then(|| {
            self.report(
                node,
                format!("requests.{attr}() with verify=False bypasses TLS certificate validation"),
            )
        })
    }
}

/// `hashlib.md5(...)` / `.sha1(...)`, case-insensitive
pub struct WeakHashHandler {
    weak_algorithms: &'static [&'static str],
}

impl Default for WeakHashHandler {
    fn default() -> Self {
        Self {
            weak_algorithms: &["md5", "sha1"],
        }
    }
}

impl Detector for WeakHashHandler {
    fn id(&self) -> &'static str {
        "WEAK_HASH"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn check(&self, node: &Node) -> Option<Finding> {
        let (_, attr) = attribute_call(node)?;
        let lowered = attr.to_ascii_lowercase();
        self.weak_algorithms
            .contains(&lowered.as_str())
            .then(|| self.report(node, format!("Weak hash algorithm: {attr}")))
    }
}

/// `tempfile.mktemp()` (TOCTOU race)
pub struct InsecureTempfileHandler;

impl Detector for InsecureTempfileHandler {
    fn id(&self) -> &'static str {
        "INSECURE_TEMPFILE"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn check(&self, node: &Node) -> Option<Finding> {
        let (_, attr) = attribute_call(node)?;
        (attr == "mktemp").then(|| {
            self.report(
                node,
                "tempfile.mktemp() is insecure (TOCTOU); use NamedTemporaryFile or mkstemp".to_string(),
            )
        })
    }
}

// ============================================================================
// SQL 注入
// ============================================================================

/// `cursor.execute(<dynamic sql>, ...)`
pub struct SqlInjectionHandler;

impl SqlInjectionHandler {
    /// `"... %s" % x`, `f"... {x}"` or `"... {}".format(x)`
    fn is_dynamic_sql(arg: &Node) -> bool {
        match &arg.kind {
            NodeKind::BinOp {
                op: BinOperator::Mod,
                ..
            } => true,
            NodeKind::JoinedStr { .. } => true,
            NodeKind::Call(call) => call.attr_name() == Some("format"),
            _ => false,
        }
    }
}

impl Detector for SqlInjectionHandler {
    fn id(&self) -> &'static str {
        "SQL_INJECTION"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn check(&self, node: &Node) -> Option<Finding> {
        let (call, attr) = attribute_call(node)?;
        if !matches!(attr, "execute" | "executemany") {
            return None;
        }
        let first = call.args.first()?;
        Self::is_dynamic_sql(first).then(|| {
            self.report(
                node,
                format!("cursor.{attr}() with dynamic SQL (f-string/%/.format) risks SQL injection; use a parameterized query"),
            )
        })
    }
}

// ============================================================================
// 框架配置
// ============================================================================

/// `app.run(debug=True)` or `app.debug = True`
pub struct FrameworkDebugHandler;

impl Detector for FrameworkDebugHandler {
    fn id(&self) -> &'static str {
        "FRAMEWORK_DEBUG"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn check(&self, node: &Node) -> Option<Finding> {
        match &node.kind {
            NodeKind::Call(call) => (call.attr_name() == Some("run") && call.has_bool_keyword("debug", true))
                .then(|| {
                    self.report(
                        node,
                        "Flask app.run(debug=True) exposes the interactive debugger".to_string(),
                    )
                }),
            NodeKind::Assign { targets, value } => {
                let debug_target = targets
                    .iter()
                    .any(|t| matches!(t.as_attribute(), Some((_, "debug"))));
                (debug_target && value.is_bool(true)).then(|| {
                    self.report(
                        node,
                        "Flask app.debug = True should not be enabled in production".to_string(),
                    )
                })
            }
            _ => None,
        }
    }
}

/// `DEBUG = True` (Django settings)
pub struct DjangoDebugHandler;

impl Detector for DjangoDebugHandler {
    fn id(&self) -> &'static str {
        "DJANGO_DEBUG"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn check(&self, node: &Node) -> Option<Finding> {
        let NodeKind::Assign { targets, value } = &node.kind else {
            return None;
        };
        (assigned_names(targets).any(|name| name == "DEBUG") && value.is_bool(true)).then(|| {
            self.report(
                node,
                "Django DEBUG=True leaks sensitive information on errors".to_string(),
            )
        })
    }
}

// ============================================================================
// 认证
// ============================================================================

/// `jwt.decode(..., options={"verify_signature": False})`
pub struct JwtNoVerifyHandler;

impl Detector for JwtNoVerifyHandler {
    fn id(&self) -> &'static str {
        "JWT_NO_VERIFY"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn check(&self, node: &Node) -> Option<Finding> {
        let (call, attr) = attribute_call(node)?;
        if attr != "decode" {
            return None;
        }

        let disabled = call
            .keywords
            .iter()
            .filter(|kw| kw.arg.as_deref() == Some("options"))
            .filter_map(|kw| match &kw.value.kind {
                NodeKind::Dict { entries } => Some(entries),
                _ => None,
            })
            .flatten()
            .any(|entry| {
                entry.key.as_ref().and_then(|k| k.as_str_constant()) == Some("verify_signature")
                    && entry.value.is_bool(false)
            });

        disabled.then(|| {
            self.report(
                node,
                "jwt.decode() with verify_signature disabled allows forged tokens".to_string(),
            )
        })
    }
}

/// `client.set_missing_host_key_policy(paramiko.AutoAddPolicy())`
pub struct AutoAddHostKeyHandler;

impl Detector for AutoAddHostKeyHandler {
    fn id(&self) -> &'static str {
        "AUTO_ADD_HOST_KEY"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn check(&self, node: &Node) -> Option<Finding> {
        let (call, attr) = attribute_call(node)?;
        if attr != "set_missing_host_key_policy" {
            return None;
        }
        let policy = call.args.first()?.as_call()?.attr_name()?;
        (policy == "AutoAddPolicy").then(|| {
            self.report(
                node,
                "Paramiko AutoAddPolicy trusts unknown host keys (MITM risk); pin host keys or use RejectPolicy".to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::tree_sitter_python::parse_source;
    use crate::scanner::walker::walk;
    use crate::scanner::Catalogue;

    /// Findings of one detector over a snippet
    fn run(detector: impl Detector + 'static, code: &str) -> Vec<Finding> {
        let tree = parse_source(code).expect("snippet should parse");
        walk(&tree, &Catalogue::new(vec![Box::new(detector)]))
    }

    fn lines(findings: &[Finding]) -> Vec<LineRef> {
        findings.iter().map(|f| f.line).collect()
    }

    #[test]
    fn test_dangerous_eval() {
        let findings = run(DangerousEvalHandler, "x = 1\n\n\n\neval(\"1+1\")\nexec(code)\n");
        assert_eq!(lines(&findings), vec![LineRef::Line(5), LineRef::Line(6)]);
        assert!(findings[0].message.contains("eval()"));
        assert!(findings.iter().all(|f| f.severity == Severity::High));

        assert!(run(DangerousEvalHandler, "builtins.eval(x)\nevaluate(x)\n").is_empty());
    }

    #[test]
    fn test_subprocess_shell() {
        let code = "subprocess.Popen('ls', shell=True)\nsubprocess.run('id', shell=True)\n";
        assert_eq!(run(SubprocessShellHandler, code).len(), 2);

        let safe = "subprocess.run(['ls'])\nsubprocess.run('ls', shell=False)\nsubprocess.run('ls', shell=1)\nsubprocess.run('ls', shell=flag)\n";
        assert!(run(SubprocessShellHandler, safe).is_empty());
    }

    #[test]
    fn test_os_system_matches_any_receiver() {
        assert_eq!(run(OsSystemHandler, "os.system('id')\nplatform.system()\n").len(), 2);
        assert!(run(OsSystemHandler, "system('id')\n").is_empty());
    }

    #[test]
    fn test_insecure_deserialize() {
        let findings = run(InsecureDeserializeHandler, "pickle.loads(data)\njson.load(fp)\n");
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, Severity::High);
        assert!(run(InsecureDeserializeHandler, "pickle.dumps(obj)\n").is_empty());
    }

    #[test]
    fn test_yaml_unsafe_load() {
        assert_eq!(run(YamlUnsafeLoadHandler, "yaml.load(s, Loader=None)\n").len(), 1);
        assert!(run(YamlUnsafeLoadHandler, "yaml.safe_load(s)\nyaml.loads(s)\n").is_empty());
    }

    #[test]
    fn test_hardcoded_secret() {
        let findings = run(HardcodedSecretHandler, "password = \"123456\"\n");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, LineRef::Line(1));
        assert!(findings[0].message.contains("'password'"));

        assert_eq!(run(HardcodedSecretHandler, "DB_PASSWORD = 'x'\nmy_ApiKey = 'y'\n").len(), 2);
        // concatenation, bytes and non-literals are not caught
        let missed = "password = 'a' + b\ntoken = b'raw'\nsecret = get_secret()\nusername = 'admin'\n";
        assert!(run(HardcodedSecretHandler, missed).is_empty());
    }

    #[test]
    fn test_tls_verify_disabled() {
        let findings = run(TlsVerifyDisabledHandler, "requests.get(url, verify=False)\n");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);

        let safe = "requests.get(url)\nrequests.patch(url, verify=False)\nrequests.get(url, verify=0)\n";
        assert!(run(TlsVerifyDisabledHandler, safe).is_empty());
    }

    #[test]
    fn test_weak_hash_is_case_insensitive() {
        let findings = run(WeakHashHandler::default(), "hashlib.md5(b\"x\")\nhashlib.SHA1(b\"x\")\n");
        assert_eq!(findings.len(), 2);
        assert!(findings[1].message.contains("SHA1"));
        assert!(run(WeakHashHandler::default(), "hashlib.sha256(b\"x\")\n").is_empty());
    }

    #[test]
    fn test_os_popen_and_mktemp() {
        assert_eq!(run(OsPopenHandler, "os.popen('ls')\n").len(), 1);
        assert_eq!(run(InsecureTempfileHandler, "path = tempfile.mktemp()\n").len(), 1);
        assert!(run(InsecureTempfileHandler, "tempfile.mkstemp()\n").is_empty());
    }

    #[test]
    fn test_sql_injection_shapes() {
        let code = r#"cursor.execute("SELECT * FROM t WHERE id = %s" % uid)
cursor.execute(f"SELECT * FROM t WHERE id = {uid}")
cursor.executemany("SELECT {}".format(uid), rows)
"#;
        assert_eq!(
            lines(&run(SqlInjectionHandler, code)),
            vec![LineRef::Line(1), LineRef::Line(2), LineRef::Line(3)]
        );

        let safe = r#"cursor.execute("SELECT * FROM t WHERE id = %s", (uid,))
cursor.execute("SELECT " + column)
cursor.execute()
cursor.execute(query, args=f"{x}")
"#;
        assert!(run(SqlInjectionHandler, safe).is_empty());
    }

    #[test]
    fn test_framework_debug_both_shapes() {
        let code = "app.run(debug=True)\napp.debug = True\n";
        assert_eq!(
            lines(&run(FrameworkDebugHandler, code)),
            vec![LineRef::Line(1), LineRef::Line(2)]
        );
        assert!(run(FrameworkDebugHandler, "app.run(debug=False)\napp.debug = 1\ndebug = True\n").is_empty());
    }

    #[test]
    fn test_django_debug() {
        assert_eq!(run(DjangoDebugHandler, "DEBUG = True\n").len(), 1);
        assert!(run(DjangoDebugHandler, "DEBUG = False\ndebug = True\nsettings.DEBUG = True\n").is_empty());
    }

    #[test]
    fn test_jwt_no_verify() {
        let code = "jwt.decode(tok, key, options={\"verify_signature\": False})\n";
        assert_eq!(run(JwtNoVerifyHandler, code).len(), 1);

        let safe = "jwt.decode(tok, key, options={\"verify_signature\": True})\njwt.decode(tok, key, options=opts)\njwt.decode(tok, key, options={\"verify_exp\": False})\n";
        assert!(run(JwtNoVerifyHandler, safe).is_empty());
    }

    #[test]
    fn test_auto_add_host_key() {
        let code = "client.set_missing_host_key_policy(paramiko.AutoAddPolicy())\n";
        assert_eq!(run(AutoAddHostKeyHandler, code).len(), 1);

        let safe = "client.set_missing_host_key_policy(AutoAddPolicy())\nclient.set_missing_host_key_policy(paramiko.RejectPolicy())\n";
        assert!(run(AutoAddHostKeyHandler, safe).is_empty());
    }

    #[test]
    fn test_insecure_random_secret() {
        let findings = run(InsecureRandomSecretHandler, "token = random.choice(x)\n");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Low);
        assert!(findings[0].message.contains("'token'"));

        let safe = "result = random.choice(x)\ntoken = rng.choice(x)\ntoken = secrets.token_hex(16)\n";
        assert!(run(InsecureRandomSecretHandler, safe).is_empty());
    }

    #[test]
    fn test_detector_ids_are_unique() {
        let ids: Vec<_> = standard_detectors().iter().map(|d| d.id()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
    }
}
