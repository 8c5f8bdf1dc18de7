mod common;

use common::{ok, status, TestServer};
use flood::{run_profile, ConfigTree, OutputSink, RuntimeContext};

fn config(base: &str, report: &str) -> ConfigTree {
    ConfigTree::parse(&format!(
        r#"<flood configversion="1">
  <urllist>
    <name>L</name>
    <baseurl>{base}</baseurl>
    <url>/ok</url>
    <url>/missing</url>
  </urllist>
  <profile>
    <name>RR</name>
    <useurllist>L</useurllist>
    <profiletype>round_robin</profiletype>
    <verify_resp>verify_200</verify_resp>
    {report}
  </profile>
</flood>"#
    ))
    .unwrap()
}

fn server() -> TestServer {
    TestServer::start(2, |i, _| if i == 0 { ok("body") } else { status(404, "Not Found") })
}

#[test]
fn test_relative_times_lines() {
    let server = server();
    let (sink, captured) = OutputSink::memory();
    let ctx = RuntimeContext::new(sink).unwrap();

    run_profile(&ctx, &config(&server.base_url(), "<report>relative_times</report>"), "RR").unwrap();
    server.finish();

    let lines = captured.lines();
    assert_eq!(lines.len(), 2);
    for (line, (verdict, path)) in lines.iter().zip([("OK", "/ok"), ("FAIL", "/missing")]) {
        let fields: Vec<&str> = line.split(' ').collect();
        assert_eq!(fields.len(), 8, "{}", line);
        assert!(fields[0].parse::<i64>().unwrap() > 0);

        let offsets: Vec<u64> = fields[1..5].iter().map(|f| f.parse().unwrap()).collect();
        assert!(offsets.windows(2).all(|w| w[0] <= w[1]), "{}", line);
        assert_eq!(fields[5], verdict);
        assert!(fields[7].ends_with(path));
    }
}

#[test]
fn test_latency_report_with_json_summary() {
    let server = server();
    let (sink, captured) = OutputSink::memory();
    let ctx = RuntimeContext::new(sink).unwrap();

    run_profile(
        &ctx,
        &config(
            &server.base_url(),
            "<report>latency</report><report_format>json</report_format>",
        ),
        "RR",
    )
    .unwrap();
    server.finish();

    let lines = captured.lines();
    assert!(lines[0].starts_with("Profile 'RR' Latency Report (1 OK, 1 FAILED"));
    for phase in ["connect", "write", "read", "close"] {
        assert!(
            lines.iter().any(|l| l.trim_start().starts_with(phase)),
            "missing {}",
            phase
        );
    }

    let json: serde_json::Value = serde_json::from_str(lines.last().unwrap()).unwrap();
    assert_eq!(json["ok"], 1);
    assert_eq!(json["failed"], 1);
    assert_eq!(json["phases"].as_array().unwrap().len(), 4);
    assert_eq!(json["throughput"]["total_requests"], 2);
}

#[test]
fn test_per_stage_override_replaces_group_member() {
    let server = server();
    let (sink, captured) = OutputSink::memory();
    let ctx = RuntimeContext::new(sink).unwrap();

    // simple reporter, but the end-of-run block is switched off
    run_profile(
        &ctx,
        &config(
            &server.base_url(),
            "<report>simple</report><report_stats>generic_report_stats</report_stats>",
        ),
        "RR",
    )
    .unwrap();
    server.finish();

    assert_eq!(captured.lines(), vec!["OK", "FAIL"]);
}
