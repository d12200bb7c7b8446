//! Tests for rejected-row handling.

use rowpipe::error::ConversionError;
use rowpipe::queue::RowQueue;
use rowpipe::stage::StageContext;
use rowpipe::testing::TempDirPath;
use rowpipe::validation::{ErrorMode, RowError, RowErrorCollector};

fn bad_amount(line: u64) -> ConversionError {
    ConversionError {
        line,
        field_index: 1,
        field: "amount".into(),
        value: "x".into(),
        reason: "invalid digit found in string".into(),
    }
}

#[test]
fn test_skip_invalid_only_counts() -> anyhow::Result<()> {
    let ctx = StageContext::detached("read");
    ctx.reject(ErrorMode::SkipInvalid, bad_amount(1))?;
    assert_eq!(ctx.metrics().snapshot().rejected, 1);
    assert_eq!(ctx.errors().error_count(), 0);
    Ok(())
}

#[test]
fn test_log_and_continue_records_error() -> anyhow::Result<()> {
    let ctx = StageContext::detached("read");
    ctx.reject(ErrorMode::LogAndContinue, bad_amount(3))?;
    ctx.reject(ErrorMode::default(), bad_amount(9))?;

    let errors = ctx.errors().errors();
    assert_eq!(errors.len(), 2);
    assert_eq!(
        errors[0],
        RowError {
            stage: "read".into(),
            line: 3,
            field_index: 1,
            field: "amount".into(),
            value: "x".into(),
            message: "invalid digit found in string".into(),
        }
    );
    assert_eq!(errors[1].line, 9);
    assert_eq!(ctx.metrics().snapshot().rejected, 2);
    Ok(())
}

#[test]
fn test_fail_fast_returns_conversion_error() {
    let ctx = StageContext::detached("read");
    let err = ctx
        .reject(ErrorMode::FailFast, bad_amount(4))
        .expect_err("fail fast must fail");
    assert_eq!(err.downcast_ref::<ConversionError>(), Some(&bad_amount(4)));
    assert_eq!(ctx.errors().error_count(), 0);
}

#[test]
fn test_detached_context_has_no_queues() -> anyhow::Result<()> {
    let mut ctx = StageContext::detached("solo");
    assert_eq!(ctx.get_row()?, None);
    ctx.put_row(vec![])?;
    assert_eq!(ctx.metrics().snapshot().output, 1);

    let q = RowQueue::unbounded();
    ctx.router_mut().add_output(q.clone());
    ctx.put_row(vec![])?;
    assert_eq!(q.size(), 1);
    assert_eq!(ctx.name(), "solo");
    Ok(())
}

#[test]
fn test_collector_is_shared_between_clones() {
    let collector = RowErrorCollector::new();
    let clone = collector.clone();
    clone.add("a", &bad_amount(1));
    assert_eq!(collector.error_count(), 1);
    assert_eq!(collector.to_string(), "RowErrorCollector(1 errors)");
    collector.clear();
    assert_eq!(clone.error_count(), 0);
}

#[test]
fn test_errors_written_as_json() -> anyhow::Result<()> {
    let collector = RowErrorCollector::new();
    collector.add("read", &bad_amount(2));
    collector.add("read", &bad_amount(5));

    let dir = TempDirPath::new()?;
    let path = dir.file_path("errors.json");
    collector.write_to_file(&path)?;

    let parsed: Vec<RowError> = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(parsed, collector.errors());
    assert_eq!(parsed[1].to_string(), "[read] line 5, field #1 (amount): \"x\": invalid digit found in string");
    Ok(())
}

#[test]
fn test_error_mode_names() -> anyhow::Result<()> {
    let modes: Vec<ErrorMode> =
        serde_json::from_str(r#"["skip_invalid", "log_and_continue", "fail_fast"]"#)?;
    assert_eq!(
        modes,
        vec![ErrorMode::SkipInvalid, ErrorMode::LogAndContinue, ErrorMode::FailFast]
    );
    Ok(())
}
