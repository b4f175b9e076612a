use pretty_assertions::assert_eq;
use sales_query::core::alias_engine::AliasEngine;
use sales_query::core::executor::run_data_tool;
use sales_query::core::pipeline::{answer_question, ask};
use sales_query::error::DataError;
use sales_query::infra::loader::load_dataset;
use serde_json::{json, Map};
use std::path::PathBuf;
use tempfile::TempDir;

fn write_csv(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("sales.csv");
    std::fs::write(&path, body).expect("write csv");
    path
}

#[test]
fn missing_file_is_a_hard_failure() {
    let temp = TempDir::new().expect("tempdir");
    let aliases = AliasEngine::standard().expect("aliases");
    let err = ask(&temp.path().join("absent.csv"), &aliases, "anything").unwrap_err();
    assert!(matches!(err, DataError::NotFound(_)));
    assert!(err.to_string().contains("absent.csv"));
}

#[test]
fn semicolon_file_with_synonym_headers_is_normalized() {
    let temp = TempDir::new().expect("tempdir");
    let path = write_csv(
        &temp,
        "Local;produtoId;ActualQuantity;PlannedQuantity;PlannedPrice;ActualPrice;PromotionType;ServiceLevel\n\
         Lima;P1;5;6;1.0;1.1;none;0.9\n",
    );
    let aliases = AliasEngine::standard().expect("aliases");
    let dataset = load_dataset(&path, &aliases).expect("load");
    assert_eq!(
        dataset.columns().to_vec(),
        vec![
            "location",
            "product_id",
            "actual_quantity",
            "planned_quantity",
            "planned_price",
            "actual_price",
            "promotion_type",
            "service_level",
        ]
    );
    assert_eq!(dataset.len(), 1);
}

#[test]
fn question_to_top_item_over_csv() {
    let temp = TempDir::new().expect("tempdir");
    let path = write_csv(&temp, "product_id,actual_quantity\nP1,5\nP2,9\nP1,3\n");
    let aliases = AliasEngine::standard().expect("aliases");

    let outcome = ask(&path, &aliases, "Which product sold the most?").expect("ask");
    assert_eq!(outcome.tool_output, "product_id\nP2    9.0\nP1    8.0");
    assert_eq!(outcome.insights, "Top item: P2 with 9.00.");
}

#[test]
fn revenue_question_groups_by_location() {
    let temp = TempDir::new().expect("tempdir");
    let path = write_csv(
        &temp,
        "Local,ProductID,ActualPrice\nLima,P1,2.5\nQuito,P1,4\nLima,P2,oops\nLima,P3,1\n",
    );
    let aliases = AliasEngine::standard().expect("aliases");
    let dataset = load_dataset(&path, &aliases).expect("load");

    let outcome = answer_question("Which location has the most revenue?", &dataset);
    assert_eq!(
        outcome.validator,
        r#"{"operation":"aggregate","group_by":"location","metric":"actual_price","agg_func":"sum"}"#
    );
    assert_eq!(outcome.tool_output, "location\nQuito    4.0\nLima     3.5");
    assert_eq!(outcome.insights, "Top item: Quito with 4.00.");
}

#[test]
fn data_tool_accepts_flat_params_and_wrapped_text() {
    let temp = TempDir::new().expect("tempdir");
    let path = write_csv(
        &temp,
        "location;product_id;actual_quantity\nNew York;P1;4\nLima;P1;6\nNew York;P2;1\n",
    );
    let aliases = AliasEngine::standard().expect("aliases");
    let dataset = load_dataset(&path, &aliases).expect("load");

    let flat = json!({
        "operation": "filter_sum",
        "condition": "location == 'New York'",
        "metric": "actual_quantity"
    });
    let flat = flat.as_object().cloned().unwrap_or_default();
    assert_eq!(run_data_tool(None, &flat, &dataset), "5.0");

    let wrapped = json!("Sure! {\"instruction\": {\"operation\": \"filter\", \"condition\": \"actual_quantity > 5\"}}");
    assert_eq!(
        run_data_tool(Some(&wrapped), &Map::new(), &dataset),
        "location product_id actual_quantity\n    Lima         P1               6"
    );
}

#[test]
fn bundled_sample_dataset_loads() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/sales.csv");
    let aliases = AliasEngine::standard().expect("aliases");
    let outcome = ask(&path, &aliases, "Which location had the highest sales volume?").expect("ask");
    assert_eq!(outcome.insights, "Top item: New York with 200.00.");
}
