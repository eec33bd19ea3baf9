use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

use skin_merge::app::merge_files_use_case::MergeFilesUseCase;
use skin_merge::app::ports::{HttpClientPort, HttpGetResult};
use skin_merge::infra::line_files::{FileLineSink, FileLineSource};
use skin_merge::pipeline::processing::enrich::{CachingResolver, RemoteSkinResolver};
use skin_merge::pipeline::processing::normalize::{normalize, NORMALIZATION_TABLE};
use skin_merge::pipeline::Pipeline;

const SKINS_JSON: &str = r#"{
  "103001": { "id": 103001, "name": "Dynasty Ahri", "rarity": "kEpic", "isLegacy": false },
  "103015": { "id": 103015, "name": "Arcana Ahri", "rarity": "kLegendary" },
  "157001": { "id": 157001, "name": "PROJECT: Yasuo", "rarity": "kNoRarity" }
}"#;

/// Serves a fixed skin document and counts how often it is asked for
struct StaticSkinServer {
    calls: AtomicUsize,
}

#[async_trait]
impl HttpClientPort for StaticSkinServer {
    async fn get(&self, _url: &str) -> Result<HttpGetResult, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HttpGetResult {
            status: 200,
            body: SKINS_JSON.to_string(),
        })
    }
}

fn pipeline_with_server() -> (Pipeline, Arc<StaticSkinServer>) {
    let server = Arc::new(StaticSkinServer {
        calls: AtomicUsize::new(0),
    });
    let remote = RemoteSkinResolver::new(server.clone(), "http://skins.test/skins.json");
    (Pipeline::new(Arc::new(CachingResolver::new(remote))), server)
}

fn lines(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

fn sorted(mut v: Vec<String>) -> Vec<String> {
    v.sort();
    v
}

fn primary_fixture() -> Vec<String> {
    lines(&[
        "alice:GOLD_SKIN_A:GOLD_SKIN_B:true:false:tagA",
        "bob:skinX:true:false:tagB",
        "",
        "carol:CHAMPION_SKIN_RENTAL_103001:CHAMPION_SKIN_RENTAL_999999:true:true:tagC",
        "dan:CHAMPION_SKIN_RENTAL_157001:CHAMPION_SKIN_RENTAL_103015:false:false:tagD",
        "   ",
        "erin:Rune(Shard):None:true:false:tagE",
        "frank:skin:true:false:tagF",
    ])
}

fn secondary_fixture() -> Vec<String> {
    lines(&[
        "alice:pw1:EUW:a@x.com:2000-01-01:2010-01-01:France",
        "",
        "carol:pw3:NA:c@x.com:1995-05-05:2012-02-02:USA",
        "frank:pw6:EUW",
        "dan:pw4:KR:d@x.com:1990-01-01:2014-03-03:Korea",
    ])
}

#[tokio::test]
async fn test_end_to_end_scenarios() -> Result<()> {
    let (pipeline, server) = pipeline_with_server();
    let report = pipeline
        .run(&primary_fixture(), &secondary_fixture(), 4)
        .await?;

    let expected = sorted(lines(&[
        "alice:pw1:EUW:a@x.com:2000-01-01:2010-01-01:France:GOLD_SKIN_A:GOLD_SKIN_B:true:false:tagA",
        "bob:skinX:true:false:tagB:Brasil",
        "carol:pw3:NA:c@x.com:1995-05-05:2012-02-02:USA:Dynasty Ahri (kEPIC):CHAMPION_SKIN_RENTAL_999999:true:true:tagC",
        "dan:pw4:KR:d@x.com:1990-01-01:2014-03-03:Korea:PROJECT- Yasuo (kNoRarity):Arcana Ahri (kLEGENDARY):false:false:tagD",
        "erin:Rune:DEFAULT:true:false:tagE:Brasil",
    ]));
    assert_eq!(sorted(report.lines.clone()), expected);

    assert_eq!(report.total_records, 6);
    assert_eq!(report.merged, 3);
    assert_eq!(report.fallback, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].user, "frank");
    assert_eq!(report.codes_resolved, 3);
    assert_eq!(report.codes_unresolved, 1);

    // the document is fetched once per run
    assert_eq!(server.calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrency_does_not_change_output() -> Result<()> {
    let (single, _) = pipeline_with_server();
    let (many, _) = pipeline_with_server();

    let one = single.run(&primary_fixture(), &secondary_fixture(), 1).await?;
    let eight = many.run(&primary_fixture(), &secondary_fixture(), 8).await?;

    assert_eq!(sorted(one.lines), sorted(eight.lines));
    assert_eq!(one.failures, eight.failures);
    Ok(())
}

#[tokio::test]
async fn test_many_records_many_workers() -> Result<()> {
    let (pipeline, server) = pipeline_with_server();
    let primary: Vec<String> = (0..500)
        .map(|i| format!("user{i:04}x:CHAMPION_SKIN_RENTAL_103015:true:false:t{i}"))
        .collect();
    let report = pipeline.run(&primary, &[], 8).await?;

    assert_eq!(report.lines.len(), 500);
    assert!(report
        .lines
        .iter()
        .all(|l| l.contains("Arcana Ahri (kLEGENDARY)") && l.ends_with(":Brasil")));
    assert_eq!(server.calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_files_in_files_out() -> Result<()> {
    let dir = tempdir()?;
    let primary_path = dir.path().join("primary.txt");
    let secondary_path = dir.path().join("secondary.txt");
    std::fs::write(&primary_path, primary_fixture().join("\n"))?;
    std::fs::write(&secondary_path, secondary_fixture().join("\n"))?;

    let (pipeline, _) = pipeline_with_server();
    let sink = FileLineSink::with_generated_name(&dir.path().join("out"), "output");
    let output_path = sink.path().to_path_buf();
    let use_case = MergeFilesUseCase::new(Box::new(FileLineSource), Box::new(sink), pipeline);

    let summary = use_case
        .execute(
            primary_path.to_str().unwrap(),
            secondary_path.to_str().unwrap(),
            3,
        )
        .await?;

    let written = std::fs::read_to_string(&output_path)?;
    assert!(written.ends_with('\n'));
    let written_lines: Vec<String> = written.lines().map(str::to_string).collect();
    assert_eq!(written_lines.len(), 5);
    assert_eq!(sorted(written_lines), sorted(summary.report.lines.clone()));
    Ok(())
}

#[test]
fn test_normalizer_idempotent_over_table_combinations() {
    let pieces: Vec<&str> = NORMALIZATION_TABLE
        .iter()
        .flat_map(|(from, to)| [*from, *to])
        .chain(["(k", ") (", "Sh", "ard)", "No", "ne", ":", " "])
        .collect();

    for a in &pieces {
        for b in &pieces {
            for c in ["", "(kEPIC) ", "No"] {
                let input = format!("{c}{a}{b}{a}");
                let once = normalize(&input);
                assert_eq!(normalize(&once), once, "input {input:?}");
            }
        }
    }
}
