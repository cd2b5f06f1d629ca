//! Structured PowerShell script model
//!
//! Generated scripts are built as a list of typed statements and rendered
//! through this serializer, which owns quoting and indentation. Generators
//! never interpolate raw script text directly, so escaping rules live in one
//! place and each generator can be unit-tested against the model.

/// A PowerShell script: optional header comment, Param() block, statements.
#[derive(Debug, Clone, Default)]
pub struct PsScript {
    header: Option<String>,
    params: Vec<PsParam>,
    statements: Vec<PsStatement>,
}

/// One entry of the Param() block.
#[derive(Debug, Clone)]
pub struct PsParam {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<String>,
    pub mandatory: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Str,
    Switch,
}

impl PsParam {
    /// A `[string]` parameter with an optional quoted default.
    pub fn string(name: impl Into<String>, default: Option<&str>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Str,
            default: default.map(str::to_string),
            mandatory: false,
        }
    }

    /// A mandatory `[string]` parameter.
    pub fn mandatory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Str,
            default: None,
            mandatory: true,
        }
    }

    /// A `[switch]` parameter.
    pub fn switch(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Switch,
            default: None,
            mandatory: false,
        }
    }

    fn render(&self) -> String {
        let mut out = String::new();
        if self.mandatory {
            out.push_str("[Parameter(Mandatory=$true)]");
        }
        match self.kind {
            ParamKind::Str => out.push_str("[string]"),
            ParamKind::Switch => out.push_str("[switch]"),
        }
        out.push('$');
        out.push_str(&self.name);
        if let Some(default) = &self.default {
            out.push_str(" = ");
            out.push_str(&quote(default));
        }
        out
    }
}

/// One statement of a generated script.
#[derive(Debug, Clone)]
pub enum PsStatement {
    /// `# text`
    Comment(String),
    /// `$Variable = <expression>`
    Assign {
        variable: String,
        expression: String,
    },
    /// A raw command line, emitted verbatim at the current indent.
    Command(String),
    /// `if (<condition>) { ... }`
    If {
        condition: String,
        body: Vec<PsStatement>,
    },
    /// `if (<condition>) { ... } else { ... }`
    IfElse {
        condition: String,
        then_body: Vec<PsStatement>,
        else_body: Vec<PsStatement>,
    },
    /// `try { ... } catch { ... }`
    Try {
        body: Vec<PsStatement>,
        catch: Vec<PsStatement>,
    },
    /// `function Name { ... }`
    Function {
        name: String,
        body: Vec<PsStatement>,
    },
    /// An empty separator line.
    Blank,
}

impl PsScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a comment line emitted before the Param() block.
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    pub fn param(mut self, param: PsParam) -> Self {
        self.params.push(param);
        self
    }

    pub fn push(&mut self, statement: PsStatement) {
        self.statements.push(statement);
    }

    pub fn extend(&mut self, statements: impl IntoIterator<Item = PsStatement>) {
        self.statements.extend(statements);
    }

    pub fn statements(&self) -> &[PsStatement] {
        &self.statements
    }

    /// Render the script to text.
    pub fn render(&self) -> String {
        let mut out = String::new();

        if let Some(header) = &self.header {
            out.push_str("# ");
            out.push_str(header);
            out.push('\n');
        }

        if !self.params.is_empty() {
            out.push_str("Param(\n");
            let rendered: Vec<String> = self
                .params
                .iter()
                .map(|p| format!("    {}", p.render()))
                .collect();
            out.push_str(&rendered.join(",\n"));
            out.push_str("\n)\n");
        }

        if (self.header.is_some() || !self.params.is_empty()) && !self.statements.is_empty() {
            out.push('\n');
        }

        for statement in &self.statements {
            render_statement(statement, 0, &mut out);
        }

        out
    }
}

fn render_statement(statement: &PsStatement, level: usize, out: &mut String) {
    let indent = "    ".repeat(level);
    match statement {
        PsStatement::Comment(text) => {
            out.push_str(&indent);
            out.push_str("# ");
            out.push_str(text);
            out.push('\n');
        }
        PsStatement::Assign {
            variable,
            expression,
        } => {
            out.push_str(&indent);
            out.push('$');
            out.push_str(variable);
            out.push_str(" = ");
            out.push_str(expression);
            out.push('\n');
        }
        PsStatement::Command(line) => {
            out.push_str(&indent);
            out.push_str(line);
            out.push('\n');
        }
        PsStatement::If { condition, body } => {
            out.push_str(&indent);
            out.push_str("if (");
            out.push_str(condition);
            out.push_str(") {\n");
            for inner in body {
                render_statement(inner, level + 1, out);
            }
            out.push_str(&indent);
            out.push_str("}\n");
        }
        PsStatement::IfElse {
            condition,
            then_body,
            else_body,
        } => {
            out.push_str(&indent);
            out.push_str("if (");
            out.push_str(condition);
            out.push_str(") {\n");
            for inner in then_body {
                render_statement(inner, level + 1, out);
            }
            out.push_str(&indent);
            out.push_str("} else {\n");
            for inner in else_body {
                render_statement(inner, level + 1, out);
            }
            out.push_str(&indent);
            out.push_str("}\n");
        }
        PsStatement::Try { body, catch } => {
            out.push_str(&indent);
            out.push_str("try {\n");
            for inner in body {
                render_statement(inner, level + 1, out);
            }
            out.push_str(&indent);
            out.push_str("} catch {\n");
            for inner in catch {
                render_statement(inner, level + 1, out);
            }
            out.push_str(&indent);
            out.push_str("}\n");
        }
        PsStatement::Function { name, body } => {
            out.push_str(&indent);
            out.push_str("function ");
            out.push_str(name);
            out.push_str(" {\n");
            for inner in body {
                render_statement(inner, level + 1, out);
            }
            out.push_str(&indent);
            out.push_str("}\n");
        }
        PsStatement::Blank => out.push('\n'),
    }
}

/// Quote a literal value for a double-quoted PowerShell string.
///
/// Backtick-escapes the characters PowerShell would otherwise interpret.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '`' => out.push_str("``"),
            '"' => out.push_str("`\""),
            '$' => out.push_str("`$"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes_metacharacters() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote("a\"b"), "\"a`\"b\"");
        assert_eq!(quote("$env"), "\"`$env\"");
        assert_eq!(quote("tick`"), "\"tick``\"");
    }

    #[test]
    fn test_param_block_rendering() {
        let script = PsScript::new()
            .with_header("Requires administrative privileges.")
            .param(PsParam::mandatory("SourceDir"))
            .param(PsParam::string("InstallRoot", Some("C:/Program Files/Agent")))
            .param(PsParam::switch("UseProxy"));

        let rendered = script.render();
        assert!(rendered.starts_with("# Requires administrative privileges.\n"));
        assert!(rendered.contains("[Parameter(Mandatory=$true)][string]$SourceDir,\n"));
        assert!(rendered.contains("[string]$InstallRoot = \"C:/Program Files/Agent\",\n"));
        assert!(rendered.contains("[switch]$UseProxy\n"));
    }

    #[test]
    fn test_nested_blocks_indent() {
        let mut script = PsScript::new();
        script.push(PsStatement::If {
            condition: "$null -eq $existing".to_string(),
            body: vec![PsStatement::Assign {
                variable: "x".to_string(),
                expression: "1".to_string(),
            }],
        });
        script.push(PsStatement::Try {
            body: vec![PsStatement::Command("icacls $d /grant 'X:(F)'".to_string())],
            catch: vec![PsStatement::Comment("swallowed".to_string())],
        });

        let rendered = script.render();
        assert!(rendered.contains("if ($null -eq $existing) {\n    $x = 1\n}\n"));
        assert!(rendered.contains("try {\n    icacls $d /grant 'X:(F)'\n} catch {\n    # swallowed\n}\n"));
    }

    #[test]
    fn test_if_else_rendering() {
        let mut script = PsScript::new();
        script.push(PsStatement::IfElse {
            condition: "$flag".to_string(),
            then_body: vec![PsStatement::Command("A".to_string())],
            else_body: vec![PsStatement::Command("B".to_string())],
        });

        assert_eq!(script.render(), "if ($flag) {\n    A\n} else {\n    B\n}\n");
    }
}
