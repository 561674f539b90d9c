use crate::refiner::categories::CategoryUnifier;
use crate::refiner::duplicates::drop_duplicate_rows;
use crate::refiner::*;
use polars::prelude::*;
use proptest::prelude::*;
use std::collections::HashMap;

type Row = (Option<i32>, Option<String>, Option<f64>);

fn row_strategy() -> impl Strategy<Value = Row> {
    (
        (0..4_i32).prop_map(Some),
        prop::option::of(prop::sample::select(vec![
            "North".to_owned(),
            "north".to_owned(),
            "South".to_owned(),
            "Sout".to_owned(),
            "East".to_owned(),
        ])),
        prop::option::of(prop::sample::select(vec![0.5, 1.5, f64::NAN])),
    )
}

fn frame(rows: &[Row]) -> DataFrame {
    let ints: Vec<Option<i32>> = rows.iter().map(|r| r.0).collect();
    let labels: Vec<Option<String>> = rows.iter().map(|r| r.1.clone()).collect();
    let floats: Vec<Option<f64>> = rows.iter().map(|r| r.2).collect();
    let columns = vec![
        Column::from(Series::new("count".into(), ints)),
        Column::from(Series::new("region".into(), labels)),
        Column::from(Series::new("score".into(), floats)),
    ];
    DataFrame::new(columns).unwrap_or_default()
}

fn subset_strategy() -> impl Strategy<Value = Option<Vec<String>>> {
    prop::option::of(prop::sample::subsequence(
        vec!["count".to_owned(), "region".to_owned(), "score".to_owned()],
        1..=3,
    ))
}

proptest! {
    #[test]
    fn prop_duplicate_elimination_is_idempotent(
        rows in prop::collection::vec(row_strategy(), 0..40),
        subset in subset_strategy(),
    ) {
        let df = frame(&rows);
        let once = drop_duplicate_rows(&df, subset.as_deref())?;
        let twice = drop_duplicate_rows(&once, subset.as_deref())?;
        prop_assert_eq!(once.height(), twice.height());
        prop_assert!(once.height() <= df.height());
    }

    #[test]
    fn prop_missing_strategies_never_grow_the_frame(
        rows in prop::collection::vec(row_strategy(), 0..40),
    ) {
        let df = frame(&rows);
        let mut ledger = TransformationLedger::new();

        let dropped = MissingValueResolver::with_strategy(MissingStrategy::Drop).resolve(&df, &mut ledger)?;
        prop_assert!(dropped.height() <= df.height());

        let smart = MissingValueResolver::with_strategy(MissingStrategy::Smart).resolve(&df, &mut ledger)?;
        prop_assert!(smart.width() <= df.width());
        prop_assert_eq!(smart.height(), df.height());
        prop_assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn prop_smart_drops_every_mostly_missing_column(
        rows in prop::collection::vec(row_strategy(), 1..40),
    ) {
        let df = frame(&rows);
        let mut ledger = TransformationLedger::new();
        let out = MissingValueResolver::default().resolve(&df, &mut ledger)?;

        for column in df.get_columns() {
            let missing = values::missing_count(column)?;
            let present = out.column(column.name()).is_ok();
            prop_assert_eq!(present, missing * 2 <= df.height());
        }
    }

    #[test]
    fn prop_canonical_value_has_the_highest_count(
        rows in prop::collection::vec(row_strategy(), 0..40),
    ) {
        let df = frame(&rows);
        let unification = CategoryUnifier::default().unify_column(&df, "region")?;

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for label in rows.iter().filter_map(|r| r.1.as_deref()) {
            *counts.entry(label).or_insert(0) += 1;
        }
        for cluster in &unification.clusters {
            let canonical = counts.get(cluster.canonical.as_str()).copied().unwrap_or(0);
            for member in &cluster.members {
                prop_assert!(canonical >= counts.get(member.as_str()).copied().unwrap_or(0));
            }
        }
        prop_assert_eq!(unification.mapping().len(), unification.unified_count());
    }

    #[test]
    fn prop_ledger_counts_recognized_operations(
        names in prop::collection::vec(
            prop::sample::select(vec![
                "clean_column_names",
                "handle_missing_values",
                "remove_duplicates",
                "normalize",
                "unify_categories",
                "bogus_op",
                "sort_rows",
            ]),
            0..8,
        ),
        rows in prop::collection::vec(row_strategy(), 0..20),
    ) {
        let df = frame(&rows);
        let (_, report) = RefinementPipeline::default().run(&df, names.as_slice());

        let mut recognized: Vec<Operation> = names.iter().filter_map(|n| Operation::parse(n)).collect();
        recognized.sort_by_key(Operation::as_str);
        recognized.dedup();
        prop_assert!(report.is_success());
        prop_assert_eq!(report.transformation_log.len(), recognized.len());
    }
}
