use pcrm_import::parser::split_statements;
use pcrm_import::transform::{IdentifierTransformer, TransformMode};

mod tests {
    use super::*;

    fn full() -> IdentifierTransformer {
        IdentifierTransformer::new("_PCRM")
    }

    fn simple() -> IdentifierTransformer {
        IdentifierTransformer::new("_PCRM").with_mode(TransformMode::Simple)
    }

    #[test]
    fn test_create_table_is_suffixed_once() {
        let once = full().transform("CREATE TABLE jobs (id int)");
        assert_eq!(once, "CREATE TABLE jobs_PCRM (id int)");
        assert_eq!(full().transform(&once), once);
    }

    #[test]
    fn test_both_modes_are_idempotent() {
        let schema = [
            "CREATE TABLE public.bookings (id integer, vacancy_id integer REFERENCES public.vacancies(id))",
            "CREATE TYPE public.shift_kind AS ENUM ('day', 'night')",
            "CREATE INDEX bookings_vacancy_idx ON public.bookings USING btree (vacancy_id)",
            "ALTER TABLE ONLY public.bookings ADD CONSTRAINT bookings_pkey PRIMARY KEY (id)",
            "INSERT INTO bookings VALUES (1, 2)",
            "ALTER TABLE public.bookings ALTER COLUMN id SET DEFAULT nextval('public.bookings_id_seq'::regclass)",
        ];
        for transformer in [full(), simple()] {
            for stmt in schema {
                let once = transformer.transform(stmt);
                assert_eq!(transformer.transform(&once), once, "{:?} not idempotent: {}", transformer.mode(), stmt);
            }
        }
    }

    #[test]
    fn test_string_literals_are_never_rewritten() {
        let sql = "INSERT INTO notes VALUES ('CREATE TABLE x (id int)', 'value::mytype', $$INSERT INTO y$$)";
        let out = full().transform(sql);
        assert_eq!(
            out,
            "INSERT INTO notes_PCRM VALUES ('CREATE TABLE x (id int)', 'value::mytype', $$INSERT INTO y$$)"
        );
    }

    #[test]
    fn test_full_mode_renames_casts_and_sequences() {
        let out = full().transform(
            "ALTER TABLE public.bookings ALTER COLUMN kind SET DEFAULT 'day'::public.shift_kind",
        );
        assert_eq!(
            out,
            "ALTER TABLE public.bookings_PCRM ALTER COLUMN kind SET DEFAULT 'day'::public.shift_kind_PCRM"
        );

        let out = full().transform("SELECT 1::integer, now()::timestamp with time zone");
        assert_eq!(out, "SELECT 1::integer, now()::timestamp with time zone");
    }

    #[test]
    fn test_simple_mode_leaves_qualified_names() {
        let out = simple().transform("CREATE TABLE public.jobs (id int)");
        assert_eq!(out, "CREATE TABLE public.jobs (id int)");
        let out = simple().transform("CREATE TABLE jobs (id int REFERENCES companies(id))");
        assert_eq!(out, "CREATE TABLE jobs_PCRM (id int REFERENCES companies_PCRM(id))");
    }

    #[test]
    fn test_none_mode_is_identity() {
        let t = IdentifierTransformer::new("_PCRM").with_mode(TransformMode::None);
        let sql = "CREATE TABLE jobs (id int)";
        assert_eq!(t.transform(sql), sql);
    }

    #[test]
    fn test_transform_whole_dump_reports_renames() {
        let dump = "CREATE TABLE a (id int);\nCREATE TABLE b (a_id int REFERENCES a(id));\nINSERT INTO a VALUES (1);";
        let transformer = full();
        let mut renamed = Vec::new();
        for stmt in split_statements(dump).unwrap() {
            let (_, report) = transformer.transform_with_report(&stmt);
            for name in report.renamed {
                if !renamed.contains(&name) {
                    renamed.push(name);
                }
            }
        }
        assert_eq!(renamed, vec!["a", "b"]);
    }
}
