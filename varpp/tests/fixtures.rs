use pretty_assertions::assert_eq;
use varpp::{
    Analyzer, Artifact, ConfigEnvironment, PresenceCondition, Record, RecordContent, SourceUnit,
    Variant, analyze_batch, analyze_source, atom,
};

const SPLIT_PTLOCK: &str = include_str!("fixtures/split_ptlock.c");
const ACPI_IDLE: &str = include_str!("fixtures/acpi_idle.c");

fn kconfig() -> ConfigEnvironment {
    ConfigEnvironment::symbolic().with_atom_prefix("CONFIG_")
}

fn records_spelled<'a>(artifact: &'a Artifact, text: &str) -> Vec<&'a Record> {
    artifact.records.iter().filter(|r| r.text() == text).collect()
}

fn only_variants(artifact: &Artifact) -> &[Variant] {
    let mut found = artifact.records.iter().filter_map(|r| match &r.content {
        RecordContent::Variants { variants } => Some(variants.as_slice()),
        RecordContent::Token { .. } => None,
    });
    let first = found.next().expect("no variant record");
    assert!(found.next().is_none(), "more than one variant record");
    first
}

#[test]
fn split_ptlock_symbolic() {
    let artifact = analyze_source("split_ptlock.c", SPLIT_PTLOCK, &kconfig()).unwrap();
    assert!(artifact.diagnostics.is_empty(), "{:?}", artifact.diagnostics);

    // five NR_CPUS alternatives times two SPLIT_PTLOCK_CPUS alternatives
    let variants = only_variants(&artifact);
    assert_eq!(variants.len(), 10);
    for (i, a) in variants.iter().enumerate() {
        assert!(!a.condition.is_false());
        for b in &variants[i + 1..] {
            assert!(a.condition.provably_disjoint(&b.condition));
        }
    }

    let hallo = records_spelled(&artifact, "hallo");
    assert_eq!(hallo.len(), 1);
    assert_eq!(hallo[0].condition, atom("CONFIG_ARCH_ENABLE_SPLIT_PMD_PTLOCK"));

    // IS_ENABLED never sees a definition of an unset option
    assert!(records_spelled(&artifact, "other")[0].condition.is_true());
    assert_eq!(records_spelled(&artifact, "test").len(), 1);

    let if_stmt = artifact
        .statements
        .iter()
        .position(|s| artifact.records[s.records.clone()].iter().any(|r| r.text() == "if"))
        .unwrap();
    assert!(artifact.statements[if_stmt].condition.is_true());
}

#[test]
fn split_ptlock_concrete() {
    let env = ConfigEnvironment::concrete().with_defined(["CONFIG_MMU", "CONFIG_SMP", "CONFIG_MAX"]);
    let artifact = analyze_source("split_ptlock.c", SPLIT_PTLOCK, &env).unwrap();
    assert!(
        artifact
            .records
            .iter()
            .all(|r| matches!(r.content, RecordContent::Token { .. }) && r.condition.is_true())
    );
    assert_eq!(records_spelled(&artifact, "64").len(), 1);
    assert_eq!(records_spelled(&artifact, "4").len(), 1);
    assert!(records_spelled(&artifact, "999999").is_empty());
    assert!(records_spelled(&artifact, "hallo").is_empty());
    assert!(records_spelled(&artifact, "other").is_empty());
    assert_eq!(records_spelled(&artifact, "test").len(), 1);
}

#[test]
fn split_ptlock_macro_table() {
    let mut analyzer = Analyzer::new(&kconfig());
    analyzer.run("split_ptlock.c", SPLIT_PTLOCK).unwrap();
    let table = analyzer.macros();

    let cpus = table.entries("CONFIG_NR_CPUS");
    assert_eq!(cpus.len(), 5);
    assert!(cpus.iter().all(|e| e.guarded && e.is_live()));
    assert!(table.defined_condition("CONFIG_NR_CPUS").is_true());

    let ptlock: Vec<&PresenceCondition> = table
        .entries("CONFIG_SPLIT_PTLOCK_CPUS")
        .iter()
        .map(|e| &e.condition)
        .collect();
    assert_eq!(ptlock, [&atom("CONFIG_MMU").not(), &atom("CONFIG_MMU")]);
    assert!(table.external_condition("CONFIG_SPLIT_PTLOCK_CPUS").is_false());
    assert_eq!(table.external_condition("CONFIG_MMU"), atom("CONFIG_MMU"));
}

#[test]
fn acpi_idle_branches() {
    let artifact = analyze_source("acpi_idle.c", ACPI_IDLE, &kconfig()).unwrap();
    let both = atom("CONFIG_PM_SLEEP").and(&atom("CONFIG_ACPI_PROCESSOR_IDLE"));
    assert_eq!(records_spelled(&artifact, "void")[0].condition, both);
    assert_eq!(records_spelled(&artifact, "static")[0].condition, both.not());

    let cstate = atom("CONFIG_ACPI_PROCESSOR_CSTATE");
    let x86 = atom("CONFIG_X86");
    let eight = records_spelled(&artifact, "8")[0];
    let two = records_spelled(&artifact, "2")[0];
    let one = records_spelled(&artifact, "1")[0];
    assert_eq!(eight.condition, cstate);
    assert_eq!(two.condition, cstate.not().and(&x86));
    assert_eq!(one.condition, cstate.not().and(&x86.not()));

    assert_eq!(eight.statement, one.statement);
    let statement = &artifact.statements[eight.statement];
    assert!(statement.condition.is_true());
    let texts: Vec<String> = artifact
        .statement_records(eight.statement)
        .iter()
        .map(Record::text)
        .collect();
    assert_eq!(texts, ["int", "limit", "=", "8", "2", "1", ";"]);
}

#[test]
fn batch_over_fixtures() {
    let units = vec![
        SourceUnit::new("split_ptlock.c", SPLIT_PTLOCK),
        SourceUnit::new("acpi_idle.c", ACPI_IDLE),
        SourceUnit::new("broken.c", "#ifdef CONFIG_A\nint a;\n"),
    ];
    let outcomes = analyze_batch(&units, &kconfig());
    let files: Vec<&str> = outcomes.iter().map(|o| o.file.as_str()).collect();
    assert_eq!(files, ["split_ptlock.c", "acpi_idle.c", "broken.c"]);
    assert!(outcomes[0].result.is_ok());
    assert!(outcomes[1].result.is_ok());
    assert!(outcomes[2].result.is_err());
}

#[test]
fn conditions_round_trip_through_json() {
    let artifact = analyze_source("acpi_idle.c", ACPI_IDLE, &kconfig()).unwrap();
    let json = serde_json::to_string(&artifact).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    for record in value["records"].as_array().unwrap() {
        let text = record["condition"].as_str().unwrap();
        let parsed: PresenceCondition = text.parse().unwrap();
        assert_eq!(parsed.to_string(), text);
    }
}
