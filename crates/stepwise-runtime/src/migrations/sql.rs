use std::path::Path;

use stepwise_core::{BoxFuture, Catalog, Migration, Result, StepwiseError};
use tracing::debug;

use crate::store::PgScope;

/// A migration defined by a block of SQL.
#[derive(Debug, Clone)]
pub struct SqlMigration {
    /// Unique name (e.g. "0001_create_settings" or "0002_seed_tags").
    pub name: String,
    /// SQL to execute.
    pub sql: String,
}

impl SqlMigration {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }

    /// Executable statements, without empty or comment-only fragments.
    pub fn statements(&self) -> Vec<String> {
        split_sql_statements(&self.sql)
    }
}

impl Migration<PgScope> for SqlMigration {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply<'a>(&'a self, scope: &'a mut PgScope) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for statement in self.statements() {
                sqlx::query(&statement)
                    .execute(&mut **scope)
                    .await
                    .map_err(|e| {
                        StepwiseError::Apply(format!(
                            "Failed to apply migration '{}': {}",
                            self.name, e
                        ))
                    })?;
            }
            Ok(())
        })
    }
}

/// Where the splitter is inside the SQL text.
enum Lexeme {
    Code,
    /// Inside `'...'` or `"..."`.
    Quoted(char),
    LineComment,
    /// Inside `/* ... */`, which nests in PostgreSQL.
    BlockComment(usize),
    /// Inside a `$$` or `$tag$` body.
    Dollar(String),
}

type Chars<'a> = std::iter::Peekable<std::str::Chars<'a>>;

/// Split SQL into individual statements.
///
/// Semicolons only end a statement in plain code: string literals, quoted
/// identifiers, comments and dollar-quoted bodies keep theirs. Fragments with
/// nothing but comments and whitespace are dropped.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_code = false;
    let mut state = Lexeme::Code;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        let next = match &state {
            Lexeme::Code => match c {
                ';' => {
                    if has_code {
                        push_statement(&mut statements, &current);
                    }
                    current.clear();
                    has_code = false;
                    None
                }
                '-' if chars.peek() == Some(&'-') => {
                    take(&mut chars, &mut current);
                    Some(Lexeme::LineComment)
                }
                '/' if chars.peek() == Some(&'*') => {
                    take(&mut chars, &mut current);
                    Some(Lexeme::BlockComment(1))
                }
                '\'' | '"' => {
                    has_code = true;
                    Some(Lexeme::Quoted(c))
                }
                '$' => {
                    has_code = true;
                    read_dollar_tag(&mut chars, &mut current).map(Lexeme::Dollar)
                }
                c => {
                    has_code |= !c.is_whitespace();
                    None
                }
            },
            Lexeme::Quoted(quote) => {
                let quote = *quote;
                if c != quote {
                    None
                } else if chars.peek() == Some(&quote) {
                    // Doubled quote is an escaped quote.
                    take(&mut chars, &mut current);
                    None
                } else {
                    Some(Lexeme::Code)
                }
            }
            Lexeme::LineComment => (c == '\n').then_some(Lexeme::Code),
            Lexeme::BlockComment(depth) => {
                let depth = *depth;
                if c == '*' && chars.peek() == Some(&'/') {
                    take(&mut chars, &mut current);
                    Some(if depth == 1 {
                        Lexeme::Code
                    } else {
                        Lexeme::BlockComment(depth - 1)
                    })
                } else if c == '/' && chars.peek() == Some(&'*') {
                    take(&mut chars, &mut current);
                    Some(Lexeme::BlockComment(depth + 1))
                } else {
                    None
                }
            }
            Lexeme::Dollar(open) => {
                if c == '$' {
                    let closing = read_dollar_tag(&mut chars, &mut current);
                    (closing.as_deref() == Some(open.as_str())).then_some(Lexeme::Code)
                } else {
                    None
                }
            }
        };

        if let Some(next) = next {
            state = next;
        }
    }

    // The last statement may not end with ';'
    if has_code {
        push_statement(&mut statements, &current);
    }
    statements
}

fn take(chars: &mut Chars<'_>, current: &mut String) {
    if let Some(c) = chars.next() {
        current.push(c);
    }
}

/// Read the rest of a `$tag$` delimiter after its opening `$`.
///
/// Returns the full delimiter, or `None` for a bare `$` such as a `$1`
/// parameter.
fn read_dollar_tag(chars: &mut Chars<'_>, current: &mut String) -> Option<String> {
    let mut tag = String::from("$");
    while let Some(&next) = chars.peek() {
        if next == '$' {
            take(chars, current);
            tag.push(next);
            return Some(tag);
        }
        if next.is_alphanumeric() || next == '_' {
            take(chars, current);
            tag.push(next);
        } else {
            break;
        }
    }
    None
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let stmt = raw.trim().trim_end_matches(';').trim();
    if !stmt.is_empty() {
        statements.push(stmt.to_string());
    }
}

/// Load SQL migrations from a directory.
///
/// Every `*.sql` file becomes one migration named after its file stem, e.g.
/// `0001_create_tags.sql` and `0002_seed_tags.sql`. Files are ordered by
/// name, so a zero-padded numeric prefix keeps the catalog order stable.
pub fn load_migrations_from_dir(dir: &Path) -> Result<Vec<SqlMigration>> {
    if !dir.exists() {
        debug!("Migrations directory does not exist: {:?}", dir);
        return Ok(Vec::new());
    }

    let mut migrations = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().map(|e| e == "sql").unwrap_or(false) {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| {
                    StepwiseError::Config(format!("Invalid migration filename: {:?}", path))
                })?
                .to_string();

            let sql = std::fs::read_to_string(&path)?;
            migrations.push(SqlMigration::new(name, sql));
        }
    }

    migrations.sort_by(|a, b| a.name.cmp(&b.name));

    debug!("Loaded {} SQL migrations", migrations.len());
    Ok(migrations)
}

/// Build a PostgreSQL catalog from the `*.sql` files in `dir`.
pub fn load_catalog_from_dir(dir: &Path) -> Result<Catalog<PgScope>> {
    let mut catalog = Catalog::new();
    for migration in load_migrations_from_dir(dir)? {
        catalog.push(Box::new(migration))?;
    }
    Ok(catalog)
}
