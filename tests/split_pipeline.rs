//! End-to-end splitting against a deterministic stub renderer.

mod common;

use std::fs;
use std::path::Path;

use common::*;
use pretty_assertions::assert_eq;
use scoresplit::{load_file, pdf, Measure, SplitError, SplitOptions, Splitter};

fn write_score(dir: &Path, name: &str, xml: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, xml).unwrap();
    path
}

fn first_measure(path: &Path) -> Measure {
    load_file(path).unwrap().parts.remove(0).measures.remove(0)
}

fn leftover_probe_dirs(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(".probe-"))
        .collect()
}

/// Ten measures, divisions 4 throughout, tempo 120 at measure 1, forte at
/// measure 5. Layout stub: `1 + m / 6` pages for `m` measures in the
/// fragment, budget 3.
#[test]
fn ten_measures_fit_one_page_with_hoisted_state() {
    let tmp = tempfile::tempdir().unwrap();
    let measures: Vec<String> = (1..=10)
        .map(|n| match n {
            1 => measure(n, &format!("{}{}", opening_attributes(), tempo(120))),
            3 => measure(n, r#"<print new-system="yes"/>"#),
            4 => measure(n, r#"<print new-page="yes"/>"#),
            5 => measure(n, &dynamic("f")),
            _ => measure(n, ""),
        })
        .collect();
    let input = write_score(tmp.path(), "scenario.musicxml", &score_xml(&[("P1", measures)]));
    let out = tmp.path().join("out");

    let renderer = StubRenderer::new(|score: &scoresplit::Score| 1 + score.parts[0].measures.len() / 6);
    let splitter = Splitter::new(&renderer, SplitOptions::default()).unwrap();
    let report = splitter.split_file(&input, &out).unwrap();

    assert_eq!(report.works, 1);
    assert_eq!(report.pages.len(), 1);
    assert!(report.flagged_pages.is_empty());
    let page = &report.pages[0];
    assert_eq!((page.page, page.first_measure, page.measure_count), (1, 1, 10));
    assert_eq!(page.content, out.join("section_1_part_P1.musicxml"));

    let content = load_file(&page.content).unwrap();
    let ms = &content.parts[0].measures;
    assert_eq!(ms.len(), 10);
    assert_eq!(ms[0].tempo(), Some(120.0));
    assert_eq!(ms[0].dynamic(), Some("f"));
    assert!(ms[0].declares("divisions"));
    assert!(ms[1..].iter().all(|m| !m.has_page_break()));
    assert_eq!(ms[9].bar_style(), Some("light-heavy"));

    // Final page: leading pad only, so 2 rendered pages trimmed to 1.
    assert_eq!(pdf::page_count(&page.artifact).unwrap(), 1);
    assert!(!out.join("section_1_part_P1.padded.musicxml").exists());
    assert!(leftover_probe_dirs(&out).is_empty());
}

#[test]
fn long_part_is_split_with_state_carried_across_pages() {
    let tmp = tempfile::tempdir().unwrap();
    let measures: Vec<String> = (1..=20)
        .map(|n| match n {
            1 => measure(n, &format!("{}{}", opening_attributes(), tempo(90))),
            5 => measure(n, &dynamic("pp")),
            10 => measure(n, &tempo(72)),
            _ => measure(n, ""),
        })
        .collect();
    let input = write_score(tmp.path(), "long.musicxml", &score_xml(&[("P1", measures)]));
    let out = tmp.path().join("out");

    let renderer = StubRenderer::new(capacity_layout(6));
    let splitter = Splitter::new(&renderer, SplitOptions::default()).unwrap();
    let report = splitter.split_file(&input, &out).unwrap();

    let spans: Vec<_> = report
        .pages
        .iter()
        .map(|p| (p.page, p.first_measure, p.measure_count))
        .collect();
    assert_eq!(spans, [(1, 1, 6), (2, 7, 6), (3, 13, 6), (4, 19, 2)]);
    assert!(report.flagged_pages.is_empty());

    for page in &report.pages {
        assert_eq!(pdf::page_count(&page.artifact).unwrap(), 1, "page {}", page.page);
    }

    let second = first_measure(&report.pages[1].content);
    assert_eq!(second.number(), Some("7"));
    assert!(second.has_page_break());
    assert_eq!(second.tempo(), Some(90.0));
    assert_eq!(second.dynamic(), Some("pp"));
    for name in ["divisions", "key", "time", "clef"] {
        assert!(second.declares(name), "page 2 lacks {name}");
    }

    let third = first_measure(&report.pages[2].content);
    assert_eq!(third.tempo(), Some(72.0));

    let interior = load_file(&report.pages[1].content).unwrap();
    assert_eq!(interior.parts[0].measures.last().unwrap().bar_style(), None);
    let last = load_file(&report.pages[3].content).unwrap();
    assert_eq!(last.parts[0].measures.last().unwrap().bar_style(), Some("light-heavy"));

    assert!(leftover_probe_dirs(&out).is_empty());
}

#[test]
fn staff_count_is_carried_with_per_staff_clefs() {
    let tmp = tempfile::tempdir().unwrap();
    let piano = r#"<attributes><divisions>4</divisions><key><fifths>0</fifths></key><time><beats>4</beats><beat-type>4</beat-type></time><staves>2</staves><clef number="1"><sign>G</sign><line>2</line></clef><clef number="2"><sign>F</sign><line>4</line></clef></attributes>"#;
    let measures: Vec<String> = (1..=8)
        .map(|n| if n == 1 { measure(n, piano) } else { measure(n, "") })
        .collect();
    let input = write_score(tmp.path(), "piano.musicxml", &score_xml(&[("P1", measures)]));
    let out = tmp.path().join("out");

    let renderer = StubRenderer::new(capacity_layout(4));
    let splitter = Splitter::new(&renderer, SplitOptions::default()).unwrap();
    let report = splitter.split_file(&input, &out).unwrap();

    let spans: Vec<_> = report.pages.iter().map(|p| (p.first_measure, p.measure_count)).collect();
    assert_eq!(spans, [(1, 4), (5, 4)]);

    let second = first_measure(&report.pages[1].content);
    let attrs = second.leading_attributes().unwrap();
    assert_eq!(attrs.child("staves").and_then(|s| s.text()), Some("2"));
    let slots: Vec<_> = attrs
        .children_named("clef")
        .filter_map(|c| c.attribute("number"))
        .collect();
    assert_eq!(slots, ["1", "2"]);
}

#[test]
fn page_numbers_continue_across_parts() {
    let tmp = tempfile::tempdir().unwrap();
    let part = |_: &str| -> Vec<String> {
        (1..=3)
            .map(|n| if n == 1 { measure(n, opening_attributes()) } else { measure(n, "") })
            .collect()
    };
    let xml = score_xml(&[("P1", part("P1")), ("P2", part("P2"))]);
    let input = write_score(tmp.path(), "duet.musicxml", &xml);
    let out = tmp.path().join("out");

    let renderer = StubRenderer::new(capacity_layout(10));
    let splitter = Splitter::new(&renderer, SplitOptions::default()).unwrap();
    let report = splitter.split_file(&input, &out).unwrap();

    let pages: Vec<_> = report.pages.iter().map(|p| (p.page, p.part.as_str())).collect();
    assert_eq!(pages, [(1, "P1"), (2, "P2")]);

    let second = load_file(out.join("section_2_part_P2.musicxml")).unwrap();
    assert_eq!(second.parts[0].id, "P2");
    let part_list = second.metadata.iter().find(|e| e.name == "part-list").unwrap();
    let ids: Vec<_> = part_list
        .children_named("score-part")
        .filter_map(|sp| sp.attribute("id"))
        .collect();
    assert_eq!(ids, ["P2"]);
    assert!(second.metadata.iter().any(|e| e.name == "defaults"));
}

#[test]
fn layout_mismatch_is_flagged_not_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let measures: Vec<String> = (1..=8)
        .map(|n| if n == 1 { measure(n, opening_attributes()) } else { measure(n, "") })
        .collect();
    let input = write_score(tmp.path(), "odd.musicxml", &score_xml(&[("P1", measures)]));
    let out = tmp.path().join("out");

    // Every render takes 3 pages: the probes fit, but the final page has
    // no trailing pad and should have come out as 2.
    let renderer = StubRenderer::new(|_: &scoresplit::Score| 3);
    let splitter = Splitter::new(&renderer, SplitOptions::default()).unwrap();
    let report = splitter.split_file(&input, &out).unwrap();

    assert!(report.pages.is_empty());
    assert_eq!(report.flagged_pages.len(), 1);
    assert_eq!(report.flagged_works, ["odd"]);
    let flagged = &report.flagged_pages[0];
    assert_eq!((flagged.rendered_pages, flagged.expected_min, flagged.expected_max), (3, 2, 2));
    assert_eq!(pdf::page_count(&flagged.artifact).unwrap(), 3);
    assert!(out.join("section_1_part_P1.padded.musicxml").exists());
}

#[test]
fn unfittable_measure_stops_the_part() {
    let tmp = tempfile::tempdir().unwrap();
    let measures = vec![measure(1, opening_attributes()), measure(2, "")];
    let input = write_score(tmp.path(), "huge.musicxml", &score_xml(&[("P1", measures)]));
    let out = tmp.path().join("out");

    let renderer = StubRenderer::new(|_: &scoresplit::Score| 4);
    let splitter = Splitter::new(&renderer, SplitOptions::default()).unwrap();
    let report = splitter.split_file(&input, &out).unwrap();

    assert!(report.pages.is_empty());
    assert!(report.has_failures());
    assert_eq!(report.failed_parts.len(), 1);
    let failed = &report.failed_parts[0];
    assert_eq!((failed.work.as_str(), failed.part.as_str()), ("huge", "P1"));
    let expected = SplitError::MeasureDoesNotFit {
        part: "P1".to_string(),
        measure: 1,
    };
    assert_eq!(failed.error, expected.to_string());
    assert!(leftover_probe_dirs(&out).is_empty());
}

struct FailingRenderer;

impl scoresplit::Renderer for FailingRenderer {
    fn render(&self, document: &Path, _artifact: &Path) -> scoresplit::Result<usize> {
        assert!(document.exists());
        Err(SplitError::Render {
            document: document.to_path_buf(),
            reason: "exit status: 1".to_string(),
        })
    }
}

#[test]
fn renderer_failure_is_recorded_and_probes_cleaned_up() {
    let tmp = tempfile::tempdir().unwrap();
    let measures = vec![measure(1, opening_attributes()), measure(2, "")];
    let input = write_score(tmp.path(), "broken.musicxml", &score_xml(&[("P1", measures)]));
    let out = tmp.path().join("out");

    let splitter = Splitter::new(FailingRenderer, SplitOptions::default()).unwrap();
    let report = splitter.split_file(&input, &out).unwrap();

    assert_eq!(report.failed_parts.len(), 1);
    assert!(report.failed_parts[0].error.starts_with("renderer failed on"));
    assert!(leftover_probe_dirs(&out).is_empty());
}

#[test]
fn failing_part_keeps_pages_of_the_others() {
    let tmp = tempfile::tempdir().unwrap();
    let part = || -> Vec<String> {
        (1..=3)
            .map(|n| if n == 1 { measure(n, opening_attributes()) } else { measure(n, "") })
            .collect()
    };
    let xml = score_xml(&[("P1", part()), ("P2", part()), ("P3", part())]);
    let corpus = tmp.path().join("corpus");
    fs::create_dir(&corpus).unwrap();
    let input = write_score(&corpus, "trio.musicxml", &xml);
    let out = tmp.path().join("out");

    // P2 never fits; P1 and P3 take one page each.
    let layout = capacity_layout(10);
    let renderer = StubRenderer::new(move |score: &scoresplit::Score| {
        if score.parts[0].id == "P2" {
            9
        } else {
            layout(score)
        }
    });
    let splitter = Splitter::new(&renderer, SplitOptions::default()).unwrap();
    let report = splitter.split_corpus(&[input], &out);

    assert!(report.failed_works.is_empty());
    let pages: Vec<_> = report.pages.iter().map(|p| (p.page, p.part.as_str())).collect();
    assert_eq!(pages, [(1, "P1"), (2, "P3")]);
    assert_eq!(report.failed_parts.len(), 1);
    assert_eq!(report.failed_parts[0].part, "P2");
    assert!(out.join("trio").join("section_1_part_P1.musicxml").exists());
    assert!(out.join("trio").join("section_2_part_P3.musicxml").exists());
    assert!(report.summary().contains("parts failed: 1"));
}

#[test]
fn corpus_run_records_failures_and_continues() {
    let tmp = tempfile::tempdir().unwrap();
    let corpus = tmp.path().join("corpus");
    fs::create_dir(&corpus).unwrap();
    let good = vec![measure(1, opening_attributes()), measure(2, "")];
    write_score(&corpus, "a-good.musicxml", &score_xml(&[("P1", good)]));
    write_score(&corpus, "b-bad.musicxml", "<score-partwise><part-list>");
    let out = tmp.path().join("out");

    let renderer = StubRenderer::new(capacity_layout(4));
    let splitter = Splitter::new(&renderer, SplitOptions::default()).unwrap();
    let inputs = scoresplit::collect_scores(&corpus).unwrap();
    let report = splitter.split_corpus(&inputs, &out);

    assert_eq!(report.works, 2);
    assert_eq!(report.pages.len(), 1);
    assert_eq!(report.failed_works.len(), 1);
    assert_eq!(report.failed_works[0].work, "b-bad");
    assert!(out.join("a-good").join("section_1_part_P1.musicxml").exists());

    report.write_json(out.join("report.json")).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("report.json")).unwrap()).unwrap();
    assert_eq!(json["works"], 2);
}

#[test]
fn budget_without_room_for_both_pads_is_rejected() {
    let options = SplitOptions {
        page_budget: 2,
        ..SplitOptions::default()
    };
    let renderer = StubRenderer::new(capacity_layout(4));
    assert!(matches!(
        Splitter::new(&renderer, options),
        Err(SplitError::Config(_))
    ));
}
