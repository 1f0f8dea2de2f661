//! MySQL to SQLite dialect rewriting using nom.
//!
//! The converter is a fixed, ordered list of [`RewriteRule`]s. Each rule
//! scans the whole script once and replaces every span its matcher
//! recognizes. Later rules see the output of earlier ones.
//!
//! ```text
//! id int(11) NOT NULL AUTO_INCREMENT,   ->  id INTEGER NOT NULL ,
//! name varchar(255) NOT NULL,           ->  name TEXT NOT NULL,
//! price decimal(10,2),                  ->  price REAL,
//! ) ENGINE=InnoDB DEFAULT CHARSET=utf8; ->  )  ;
//! ```
//!
//! Parameter lists are scanned up to the first closing parenthesis and
//! never across a `;`, so `decimal(10,2) NOT NULL, qty int(11)` keeps its
//! second column intact.

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_until, take_while, take_while1},
    character::complete::{char, digit1, multispace0, multispace1, satisfy},
    combinator::{not, opt, recognize},
    sequence::{pair, terminated, tuple},
    IResult,
};
use tracing::debug;

use crate::error::{Error, Result};

/// A matcher recognizes a span at the very start of its input.
pub type Matcher = for<'a> fn(&'a str) -> IResult<&'a str, &'a str>;

/// Where a rule is allowed to start matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Previous character is not part of an identifier.
    Word,
    /// Only whitespace since the start of the text, a line, or a `;`.
    Statement,
}

impl Anchor {
    fn admits(self, prev: Option<char>, statement_start: bool) -> bool {
        match self {
            Anchor::Word => prev.map_or(true, |c| !is_ident_char(c)),
            Anchor::Statement => statement_start,
        }
    }
}

/// One ordered rewrite: every span recognized by `matcher` becomes
/// `replacement`.
#[derive(Debug, Clone, Copy)]
pub struct RewriteRule {
    pub name: &'static str,
    pub anchor: Anchor,
    pub matcher: Matcher,
    pub replacement: &'static str,
}

impl RewriteRule {
    /// Apply this rule over the whole text, returning the rewritten text
    /// and the number of replacements made.
    pub fn apply(&self, text: &str) -> (String, usize) {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        let mut hits = 0;
        let mut statement_start = true;

        while let Some(c) = rest.chars().next() {
            if self.anchor.admits(out.chars().next_back(), statement_start) {
                if let Ok((after, matched)) = (self.matcher)(rest) {
                    if !matched.is_empty() {
                        out.push_str(self.replacement);
                        statement_start = matched.ends_with(';')
                            || (statement_start && self.replacement.is_empty());
                        rest = after;
                        hits += 1;
                        continue;
                    }
                }
            }

            out.push(c);
            statement_start = match c {
                ';' | '\n' => true,
                c if c.is_whitespace() => statement_start,
                _ => false,
            };
            rest = &rest[c.len_utf8()..];
        }

        (out, hits)
    }
}

static RULES: [RewriteRule; 9] = [
    RewriteRule {
        name: "integer-size",
        anchor: Anchor::Word,
        matcher: integer_type,
        replacement: "INTEGER",
    },
    RewriteRule {
        name: "varchar-size",
        anchor: Anchor::Word,
        matcher: varchar_type,
        replacement: "TEXT",
    },
    RewriteRule {
        name: "decimal-double",
        anchor: Anchor::Word,
        matcher: real_type,
        replacement: "REAL",
    },
    RewriteRule {
        name: "auto-increment",
        anchor: Anchor::Word,
        matcher: auto_increment,
        replacement: "",
    },
    RewriteRule {
        name: "create-database",
        anchor: Anchor::Statement,
        matcher: create_database,
        replacement: "",
    },
    RewriteRule {
        name: "use-database",
        anchor: Anchor::Statement,
        matcher: use_database,
        replacement: "",
    },
    RewriteRule {
        name: "engine",
        anchor: Anchor::Word,
        matcher: engine,
        replacement: "",
    },
    RewriteRule {
        name: "charset",
        anchor: Anchor::Word,
        matcher: charset,
        replacement: "",
    },
    RewriteRule {
        name: "collate",
        anchor: Anchor::Word,
        matcher: collate,
        replacement: "",
    },
];

/// The rewrite rules in the order they are applied.
pub fn rules() -> &'static [RewriteRule] {
    &RULES
}

/// Rewrite a MySQL script into SQLite syntax.
///
/// Fails with [`Error::EmptyScript`] when the script is empty or only
/// whitespace. Anything no rule recognizes passes through unchanged.
pub fn convert(script: &str) -> Result<String> {
    if script.trim().is_empty() {
        return Err(Error::EmptyScript);
    }

    let mut sql = script.to_string();
    for rule in rules() {
        let (rewritten, hits) = rule.apply(&sql);
        if hits > 0 {
            debug!(rule = rule.name, hits, "applied rewrite rule");
        }
        sql = rewritten;
    }
    Ok(sql)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn ident(input: &str) -> IResult<&str, &str> {
    take_while1(is_ident_char)(input)
}

/// Succeeds without consuming when the next character ends a word.
fn boundary(input: &str) -> IResult<&str, ()> {
    not(satisfy(is_ident_char))(input)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag_no_case(word), boundary)
}

/// `(`, anything but parentheses or a terminator, `)`.
fn param_list(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        char('('),
        take_while(|c: char| c != '(' && c != ')' && c != ';'),
        char(')'),
    )))(input)
}

/// `=` with optional padding, or plain whitespace.
fn assign(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(tuple((multispace0, char('='), multispace0))),
        multispace1,
    ))(input)
}

fn integer_type(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((
            tag_no_case("tinyint"),
            tag_no_case("smallint"),
            tag_no_case("mediumint"),
            tag_no_case("bigint"),
            tag_no_case("integer"),
            tag_no_case("int"),
        )),
        param_list,
    ))(input)
}

fn varchar_type(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag_no_case("varchar"), param_list))(input)
}

/// Only the sized form; bare `decimal`/`double` are valid SQLite type names.
fn real_type(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((tag_no_case("decimal"), tag_no_case("double"))),
        param_list,
    ))(input)
}

/// Column modifier, or the `AUTO_INCREMENT = N` table option.
fn auto_increment(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        keyword("auto_increment"),
        opt(tuple((multispace0, char('='), multispace0, digit1))),
    ))(input)
}

fn create_database(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        tag_no_case("create"),
        multispace1,
        alt((keyword("database"), keyword("schema"))),
        take_until(";"),
        char(';'),
    )))(input)
}

fn use_database(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        tag_no_case("use"),
        multispace1,
        take_until(";"),
        char(';'),
    )))(input)
}

fn engine(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        tag_no_case("engine"),
        multispace0,
        char('='),
        multispace0,
        ident,
    )))(input)
}

fn charset(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(tuple((
            tag_no_case("default"),
            multispace1,
            tag_no_case("charset"),
            assign,
            ident,
        ))),
        recognize(tuple((
            opt(pair(tag_no_case("default"), multispace1)),
            tag_no_case("character"),
            multispace1,
            tag_no_case("set"),
            assign,
            ident,
        ))),
        recognize(tuple((
            tag_no_case("charset"),
            multispace0,
            char('='),
            multispace0,
            ident,
        ))),
    ))(input)
}

fn collate(input: &str) -> IResult<&str, &str> {
    recognize(tuple((tag_no_case("collate"), assign, ident)))(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn squash(sql: &str) -> String {
        sql.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_empty_script_is_rejected() {
        assert!(matches!(convert(""), Err(Error::EmptyScript)));
        assert!(matches!(convert("  \r\n\t "), Err(Error::EmptyScript)));
    }

    #[test]
    fn test_column_types() {
        assert_eq!(convert("varchar(255) NOT NULL").unwrap(), "TEXT NOT NULL");
        assert_eq!(convert("int(11)").unwrap(), "INTEGER");
        assert_eq!(convert("decimal(10,2)").unwrap(), "REAL");
        assert_eq!(convert("double(8,2)").unwrap(), "REAL");
    }

    #[test]
    fn test_matching_ignores_case() {
        assert_eq!(
            convert("Id INT(11), Name VarChar(40), Fee DECIMAL(6, 2)").unwrap(),
            "Id INTEGER, Name TEXT, Fee REAL"
        );
    }

    #[test]
    fn test_integer_family() {
        assert_eq!(
            convert("a tinyint(1), b bigint(20), c smallint(6), d mediumint(9)").unwrap(),
            "a INTEGER, b INTEGER, c INTEGER, d INTEGER"
        );
    }

    #[test]
    fn test_unsized_decimal_and_double_are_kept() {
        let sql = "CREATE TABLE room (id int(11), `double` tinyint(1), kind varchar(10));\n\
                   INSERT INTO room VALUES (1, 0, 'Double');";
        assert_eq!(
            convert(sql).unwrap(),
            "CREATE TABLE room (id INTEGER, `double` INTEGER, kind TEXT);\n\
             INSERT INTO room VALUES (1, 0, 'Double');"
        );
        assert_eq!(convert("x decimal, y double").unwrap(), "x decimal, y double");
    }

    #[test]
    fn test_param_list_stops_at_first_paren() {
        let sql = "CREATE TABLE bill (amount decimal(10,2) NOT NULL, \
                   patient_id int(11) DEFAULT NULL, CHECK (amount > 0));";
        assert_eq!(
            convert(sql).unwrap(),
            "CREATE TABLE bill (amount REAL NOT NULL, \
             patient_id INTEGER DEFAULT NULL, CHECK (amount > 0));"
        );
    }

    #[test]
    fn test_type_names_inside_identifiers_are_kept() {
        assert_eq!(convert("point(1, 2)").unwrap(), "point(1, 2)");
        assert_eq!(convert("print(3)").unwrap(), "print(3)");
    }

    #[test]
    fn test_auto_increment_removed() {
        assert_eq!(
            convert("id int(11) NOT NULL AUTO_INCREMENT,").unwrap(),
            "id INTEGER NOT NULL ,"
        );
        assert_eq!(
            convert("id INTEGER PRIMARY KEY auto_increment").unwrap(),
            "id INTEGER PRIMARY KEY "
        );
    }

    #[test]
    fn test_table_options_removed() {
        let sql = ") ENGINE=InnoDB AUTO_INCREMENT=5 DEFAULT CHARSET=utf8mb4 \
                   COLLATE=utf8mb4_unicode_ci;";
        assert_eq!(squash(&convert(sql).unwrap()), ") ;");

        let sql = ") ENGINE = MyISAM DEFAULT CHARSET = latin1;";
        assert_eq!(squash(&convert(sql).unwrap()), ") ;");
    }

    #[test]
    fn test_column_charset_and_collation_removed() {
        let sql = "name varchar(50) CHARACTER SET utf8 COLLATE utf8_bin NOT NULL";
        assert_eq!(squash(&convert(sql).unwrap()), "name TEXT NOT NULL");
    }

    #[test]
    fn test_create_database_and_use_removed() {
        let sql = "CREATE DATABASE hospital; USE hospital; CREATE TABLE t (id int(11));";
        assert_eq!(convert(sql).unwrap().trim(), "CREATE TABLE t (id INTEGER);");
    }

    #[test]
    fn test_multiline_create_database_removed() {
        let sql = "CREATE DATABASE IF NOT EXISTS\n  hospital\n  DEFAULT CHARACTER SET utf8;\n\
                   use\n  hospital;\nCREATE TABLE t (id int(11));\n";
        assert_eq!(convert(sql).unwrap(), "\n\nCREATE TABLE t (id INTEGER);\n");
    }

    #[test]
    fn test_use_needs_statement_start() {
        let sql = "CREATE TABLE users (user_id int(11));\nINSERT INTO\nusers VALUES (1);";
        assert_eq!(
            convert(sql).unwrap(),
            "CREATE TABLE users (user_id INTEGER);\nINSERT INTO\nusers VALUES (1);"
        );
    }

    #[test]
    fn test_unknown_constructs_pass_through() {
        let sql = "CREATE TABLE t (d datetime, e enum('a','b'));";
        assert_eq!(convert(sql).unwrap(), sql);
    }

    #[test]
    fn test_rule_order() {
        let names: Vec<&str> = rules().iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "integer-size",
                "varchar-size",
                "decimal-double",
                "auto-increment",
                "create-database",
                "use-database",
                "engine",
                "charset",
                "collate",
            ]
        );
    }

    #[test]
    fn test_apply_counts_hits() {
        let (out, hits) = rules()[1].apply("a varchar(1), b varchar(2), c text");
        assert_eq!(out, "a TEXT, b TEXT, c text");
        assert_eq!(hits, 2);
    }
}
