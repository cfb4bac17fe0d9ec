//! 规则定义
//!
//! 所有规则在此集中定义，顺序与检测器目录一致

use super::{Category, RuleDefinition};
use crate::scanner::Severity;

/// 获取所有规则定义
pub fn all_rules() -> Vec<RuleDefinition> {
    vec![
        RuleDefinition {
            id: "DANGEROUS_EVAL",
            category: Category::Injection,
            severity: Severity::High,
            description: "eval()/exec() call",
            rationale: "Evaluating a string as code runs whatever an attacker manages to put in it.",
            fix_suggestion: "Use ast.literal_eval for literals or an explicit dispatch table",
        },
        RuleDefinition {
            id: "SUBPROCESS_SHELL",
            category: Category::Injection,
            severity: Severity::High,
            description: "subprocess Popen/call/run with shell=True",
            rationale: "The command line is interpreted by /bin/sh, so metacharacters in arguments become commands.",
            fix_suggestion: "Pass an argument list and keep shell=False",
        },
        RuleDefinition {
            id: "OS_SYSTEM",
            category: Category::Injection,
            severity: Severity::Medium,
            description: "os.system() call",
            rationale: "os.system always goes through the shell.",
            fix_suggestion: "Use subprocess.run with an argument list",
        },
        RuleDefinition {
            id: "INSECURE_DESERIALIZE",
            category: Category::Deserialization,
            severity: Severity::High,
            description: ".load()/.loads() call on any object (pickle and look-alikes)",
            rationale: "Unpickling executes constructors chosen by the data.",
            fix_suggestion: "Use json or another data-only format for untrusted input",
        },
        RuleDefinition {
            id: "YAML_UNSAFE_LOAD",
            category: Category::Deserialization,
            severity: Severity::High,
            description: "yaml.load() call",
            rationale: "The full loader can instantiate arbitrary Python objects.",
            fix_suggestion: "Use yaml.safe_load or Loader=yaml.SafeLoader",
        },
        RuleDefinition {
            id: "HARDCODED_SECRET",
            category: Category::Secrets,
            severity: Severity::High,
            description: "string literal assigned to a credential-like variable",
            rationale: "Secrets in source end up in version control, logs and build artifacts.",
            fix_suggestion: "Read secrets from the environment or a secret manager",
        },
        RuleDefinition {
            id: "TLS_VERIFY_DISABLED",
            category: Category::Transport,
            severity: Severity::Medium,
            description: "HTTP request with verify=False",
            rationale: "Disabling certificate validation allows man-in-the-middle interception.",
            fix_suggestion: "Keep verification on; pass a CA bundle path if needed",
        },
        RuleDefinition {
            id: "WEAK_HASH",
            category: Category::Crypto,
            severity: Severity::Medium,
            description: "md5/sha1 hash",
            rationale: "MD5 and SHA-1 are broken for collision resistance and cheap to brute-force.",
            fix_suggestion: "Use sha256+ for integrity, bcrypt/scrypt/argon2 for passwords",
        },
        RuleDefinition {
            id: "OS_POPEN",
            category: Category::Injection,
            severity: Severity::Medium,
            description: "os.popen() call",
            rationale: "os.popen runs its argument through the shell.",
            fix_suggestion: "Use subprocess.run with an argument list and capture_output=True",
        },
        RuleDefinition {
            id: "INSECURE_TEMPFILE",
            category: Category::FileSystem,
            severity: Severity::Medium,
            description: "tempfile.mktemp() call",
            rationale: "The returned name can be claimed by another process before it is opened (TOCTOU).",
            fix_suggestion: "Use NamedTemporaryFile or mkstemp",
        },
        RuleDefinition {
            id: "SQL_INJECTION",
            category: Category::Injection,
            severity: Severity::High,
            description: "execute()/executemany() with a formatted query string",
            rationale: "Values interpolated into SQL text can change the query structure.",
            fix_suggestion: "Use placeholders and pass parameters separately",
        },
        RuleDefinition {
            id: "FRAMEWORK_DEBUG",
            category: Category::Configuration,
            severity: Severity::Medium,
            description: "Flask run(debug=True) or app.debug = True",
            rationale: "The Werkzeug debugger allows code execution from the browser.",
            fix_suggestion: "Drive debug mode from configuration and keep it off in production",
        },
        RuleDefinition {
            id: "DJANGO_DEBUG",
            category: Category::Configuration,
            severity: Severity::Medium,
            description: "DEBUG = True",
            rationale: "Django debug pages expose settings, SQL and stack traces.",
            fix_suggestion: "Set DEBUG from the environment, defaulting to False",
        },
        RuleDefinition {
            id: "JWT_NO_VERIFY",
            category: Category::Authentication,
            severity: Severity::High,
            description: "jwt.decode() with verify_signature disabled",
            rationale: "Unverified tokens can be forged by anyone.",
            fix_suggestion: "Always verify the signature and pin the accepted algorithms",
        },
        RuleDefinition {
            id: "AUTO_ADD_HOST_KEY",
            category: Category::Transport,
            severity: Severity::Medium,
            description: "Paramiko AutoAddPolicy",
            rationale: "Unknown host keys are trusted silently, enabling man-in-the-middle attacks.",
            fix_suggestion: "Load known_hosts and use RejectPolicy",
        },
        RuleDefinition {
            id: "INSECURE_RANDOM_SECRET",
            category: Category::Secrets,
            severity: Severity::Low,
            description: "random module used for a token/secret/key",
            rationale: "The random module is a predictable PRNG.",
            fix_suggestion: "Use the secrets module",
        },
    ]
}
