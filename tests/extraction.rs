mod common;

use common::{HEADERS, billing_row, number, raw_table, text};
use subtotal_tools::extract::{aggregate, extract};
use subtotal_tools::model::CellValue;
use subtotal_tools::schema::{Resolution, resolve};
use subtotal_tools::{AliasDirectory, PipelineConfig, ToolError};

#[test]
fn resolution_follows_candidate_priority_not_column_position() {
    let raw = raw_table(&["total", "amount"], Vec::new());

    let aliases = AliasDirectory::new().with_field("amount", ["amount", "total"]);
    let table = resolve(&raw, &aliases);
    assert_eq!(
        table.resolution().get("amount"),
        Some(&Resolution::Resolved {
            label: "amount".to_string(),
            column: 1,
        })
    );

    let aliases = AliasDirectory::new().with_field("amount", ["total", "amount"]);
    let table = resolve(&raw, &aliases);
    assert_eq!(table.resolution().column("amount"), Some(0));
}

#[test]
fn resolution_ignores_spacing_newlines_and_case() {
    let raw = raw_table(&["Order\nCode", " 오더 금액 "], Vec::new());
    let aliases = AliasDirectory::new()
        .with_field("code", ["ordercode"])
        .with_field("amount", ["오더금액"])
        .with_field("price", ["단가"]);

    let table = resolve(&raw, &aliases);
    assert_eq!(table.resolution().column("code"), Some(0));
    assert_eq!(table.resolution().column("amount"), Some(1));
    assert_eq!(table.resolution().get("price"), Some(&Resolution::Unresolved));
    assert_eq!(table.headers(), vec!["code", "amount"]);
}

#[test]
fn first_raw_header_wins_among_normalized_duplicates() {
    let raw = raw_table(&["오더 금액", "오더금액"], Vec::new());
    let aliases = AliasDirectory::new().with_field("오더금액", ["오더금액"]);
    let table = resolve(&raw, &aliases);
    assert_eq!(table.resolution().column("오더금액"), Some(0));
}

#[test]
fn subtotal_rows_are_projected_and_coerced() {
    let raw = raw_table(
        &HEADERS,
        vec![
            billing_row("1001", "A1", number(100.0), number(10.0)),
            billing_row("소계", "A1", text("1,234.50"), text("50")),
            billing_row(" 소 계 ", "B2", text("-12"), text("abc")),
        ],
    );
    let config = PipelineConfig::default();

    let extraction = extract(&raw, &config).expect("extraction succeeds");
    let table = &extraction.table;

    assert_eq!(table.headers, config.display_fields);
    assert_eq!(table.row_count(), 2);
    assert_eq!(
        table.rows[0],
        vec![
            text("A1"),
            text("EDI-A1"),
            number(1234.5),
            number(50.0),
            CellValue::Empty,
            number(1.0),
            text("오더 A1"),
        ]
    );
    assert_eq!(table.rows[1][2], number(-12.0));
    assert_eq!(table.rows[1][3], number(0.0));
    assert_eq!(extraction.coercion_losses, 1);
    assert_eq!(extraction.resolution.get("계산"), Some(&Resolution::Synthesized));

    let totals = aggregate(table, config.numeric_display_fields());
    assert_eq!(totals.row_count, 2);
    assert_eq!(totals.sum("오더금액"), 1222.5);
    assert_eq!(totals.sum("단가"), 50.0);
}

#[test]
fn plain_trim_policy_rejects_inner_spaces() {
    let raw = raw_table(
        &HEADERS,
        vec![billing_row(" 소 계 ", "B2", number(1.0), number(1.0))],
    );
    let config = PipelineConfig {
        collapse_marker_whitespace: false,
        ..PipelineConfig::default()
    };
    let extraction = extract(&raw, &config).expect("extraction succeeds");
    assert_eq!(extraction.table.row_count(), 0);
}

#[test]
fn quantity_is_coerced_only_when_enabled() {
    let mut row = billing_row("소계", "A1", number(1.0), number(1.0));
    row[6] = text("3일");
    let raw = raw_table(&HEADERS, vec![row]);

    let config = PipelineConfig::default();
    let extraction = extract(&raw, &config).expect("extraction succeeds");
    assert_eq!(extraction.table.rows[0][5], text("3일"));

    let config = PipelineConfig {
        coerce_quantity: true,
        ..PipelineConfig::default()
    };
    let extraction = extract(&raw, &config).expect("extraction succeeds");
    assert_eq!(extraction.table.rows[0][5], number(3.0));
}

#[test]
fn no_subtotal_rows_yields_empty_table_and_zero_sums() {
    let raw = raw_table(
        &HEADERS,
        vec![billing_row("1001", "A1", number(100.0), number(10.0))],
    );
    let config = PipelineConfig::default();

    let extraction = extract(&raw, &config).expect("extraction succeeds");
    assert_eq!(extraction.table.row_count(), 0);

    let totals = aggregate(&extraction.table, config.numeric_display_fields());
    assert_eq!(totals.row_count, 0);
    assert_eq!(totals.sum("오더금액"), 0.0);
    assert_eq!(totals.sum("단가"), 0.0);
}

#[test]
fn absent_fields_aggregate_to_zero() {
    let raw = raw_table(&HEADERS, vec![billing_row("소계", "A1", number(5.0), number(1.0))]);
    let extraction = extract(&raw, &PipelineConfig::default()).expect("extraction succeeds");
    let totals = aggregate(&extraction.table, ["오더금액", "없는필드"]);
    assert_eq!(totals.sum("오더금액"), 5.0);
    assert_eq!(totals.sums.get("없는필드"), Some(&0.0));
}

#[test]
fn missing_required_field_never_lists_the_optional_field() {
    let headers: Vec<&str> = HEADERS.iter().copied().filter(|h| *h != "단가").collect();
    let raw = raw_table(&headers, Vec::new());

    let mut config = PipelineConfig::default();
    config.required_fields.push("계산".to_string());

    match extract(&raw, &config) {
        Err(ToolError::MissingRequiredFields { missing, headers }) => {
            assert_eq!(missing, vec!["단가".to_string()]);
            assert_eq!(headers.first().map(String::as_str), Some("차트번호"));
        }
        other => panic!("expected a missing-field error, got {other:?}"),
    }
}

#[test]
fn present_optional_field_is_used() {
    let mut headers = HEADERS.to_vec();
    headers.push("계산");
    let mut row = billing_row("소계", "A1", number(1.0), number(1.0));
    row.push(text("2회"));
    let raw = raw_table(&headers, vec![row]);

    let extraction = extract(&raw, &PipelineConfig::default()).expect("extraction succeeds");
    assert_eq!(extraction.table.rows[0][4], text("2회"));
    assert!(matches!(
        extraction.resolution.get("계산"),
        Some(Resolution::Resolved { column: 8, .. })
    ));
}
