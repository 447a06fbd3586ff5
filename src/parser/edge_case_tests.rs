/// Edge case tests for the statement splitter.
///
/// These tests cover:
/// - Termination variants and empty input
/// - Quotes, doubled quotes and quoted identifiers
/// - Dollar-quoted blocks with and without tags
/// - Comments (-- and /* */)
/// - Unterminated regions in strict and lenient mode
/// - Multi-byte UTF-8 content

#[cfg(test)]
mod edge_case_tests {
    use crate::parser::{
        split_executable_statements, split_statements, split_statements_lenient, QuoteKind,
        SplitError,
    };

    // =========================================================================
    // A. Termination
    // =========================================================================

    #[test]
    fn test_statement_without_trailing_semicolon() {
        let stmts = split_statements("CREATE TABLE t1 (id INT)").unwrap();
        assert_eq!(stmts, vec!["CREATE TABLE t1 (id INT)"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(split_statements("").unwrap().is_empty());
    }

    #[test]
    fn test_whitespace_and_semicolons_only() {
        assert!(split_statements("  ;\n ; \t").unwrap().is_empty());
    }

    #[test]
    fn test_comment_only_statement_dropped() {
        let stmts = split_statements("-- header\n;\nINSERT INTO t VALUES (1);\n/* trailer */").unwrap();
        assert_eq!(stmts, vec!["INSERT INTO t VALUES (1)"]);
    }

    #[test]
    fn test_order_preserved() {
        let stmts = split_statements("CREATE TABLE a (id int);\nCREATE TABLE b (a_id int REFERENCES a);\nINSERT INTO a VALUES (1);").unwrap();
        assert_eq!(stmts.len(), 3);
        assert!(stmts[0].contains("TABLE a"));
        assert!(stmts[1].contains("TABLE b"));
        assert!(stmts[2].starts_with("INSERT"));
    }

    // =========================================================================
    // B. Strings and identifiers
    // =========================================================================

    #[test]
    fn test_doubled_quote_does_not_close_string() {
        let stmts = split_statements("INSERT INTO t VALUES ('it''s; fine'); SELECT 1;").unwrap();
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "INSERT INTO t VALUES ('it''s; fine')");
    }

    #[test]
    fn test_empty_string_literal() {
        let stmts = split_statements("INSERT INTO t VALUES ('', ';');").unwrap();
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn test_semicolon_in_quoted_identifier() {
        let stmts = split_statements("CREATE TABLE \"odd;name\" (id int);").unwrap();
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn test_dollar_inside_string_is_ignored() {
        let stmts = split_statements("INSERT INTO t VALUES ('$$;'); INSERT INTO t VALUES (2);").unwrap();
        assert_eq!(stmts.len(), 2);
    }

    // =========================================================================
    // C. Dollar quoting
    // =========================================================================

    #[test]
    fn test_tagged_dollar_quote() {
        let sql = "CREATE FUNCTION f() RETURNS text AS $body$ SELECT 'a;b'; SELECT $$x;$$; $body$ LANGUAGE sql; SELECT 1;";
        let stmts = split_statements(sql).unwrap();
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].ends_with("LANGUAGE sql"));
    }

    #[test]
    fn test_quote_inside_dollar_block_ignored() {
        let sql = "CREATE FUNCTION f() RETURNS void AS $$ BEGIN RAISE NOTICE 'it''s'; PERFORM ';'; END $$ LANGUAGE plpgsql;";
        assert_eq!(split_statements(sql).unwrap().len(), 1);
    }

    #[test]
    fn test_positional_parameters_are_not_dollar_quotes() {
        let sql = "CREATE FUNCTION add(int, int) RETURNS int AS 'select $1 + $2;' LANGUAGE sql; SELECT 1;";
        assert_eq!(split_statements(sql).unwrap().len(), 2);
    }

    // =========================================================================
    // D. Comments
    // =========================================================================

    #[test]
    fn test_semicolon_in_line_comment() {
        let sql = "INSERT INTO t VALUES (1) -- trailing; note\n, (2);";
        assert_eq!(split_statements(sql).unwrap().len(), 1);
    }

    #[test]
    fn test_quote_in_comment_does_not_open_string() {
        let sql = "-- don't\nINSERT INTO t VALUES (1);\n/* it's */ INSERT INTO t VALUES (2);";
        assert_eq!(split_statements(sql).unwrap().len(), 2);
    }

    // =========================================================================
    // E. Unterminated input
    // =========================================================================

    #[test]
    fn test_unterminated_string_is_error() {
        let err = split_statements("SELECT 1;\nINSERT INTO t VALUES ('oops);").unwrap_err();
        assert_eq!(
            err,
            SplitError::Unterminated {
                kind: QuoteKind::SingleQuote,
                line: 2
            }
        );
    }

    #[test]
    fn test_unterminated_dollar_quote_is_error() {
        let err = split_statements("CREATE FUNCTION f() AS $$ BEGIN; END;").unwrap_err();
        assert!(matches!(
            err,
            SplitError::Unterminated {
                kind: QuoteKind::DollarQuote,
                line: 1
            }
        ));
    }

    #[test]
    fn test_unterminated_lenient_closes_implicitly() {
        let stmts = split_statements_lenient("SELECT 1; INSERT INTO t VALUES ('oops; more");
        assert_eq!(stmts, vec!["SELECT 1", "INSERT INTO t VALUES ('oops; more"]);
    }

    // =========================================================================
    // F. Strict variant and encodings
    // =========================================================================

    #[test]
    fn test_strict_variant_filters_noise() {
        let sql = "ALTER TABLE t OWNER TO postgres;\nGRANT ALL ON t TO app;\nCOMMENT ON TABLE t IS 'x';\nCREATE TABLE t (id int);\nALTER TABLE t ADD c int;\nSELECT 1;\ninsert into t values (1);";
        let stmts = split_executable_statements(sql).unwrap();
        assert_eq!(
            stmts,
            vec![
                "CREATE TABLE t (id int)",
                "ALTER TABLE t ADD c int",
                "insert into t values (1)"
            ]
        );
    }

    #[test]
    fn test_multibyte_content() {
        let stmts = split_statements("INSERT INTO t VALUES ('Zoë; Łódź');INSERT INTO t VALUES ('日本');").unwrap();
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("Łódź"));
    }
}
