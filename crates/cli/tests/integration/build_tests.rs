//! Build command integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, assign};

const CONST_V: &str = "module top(output o); assign o = 1'b0; endmodule\n";

#[test]
fn route_graph_from_verilog_runs_synthesis_then_vpr() {
  let env = TestEnv::new();
  env.write_file("const.v", CONST_V);

  env.build().arg("const.rr_graph.xml").assert().success();

  let log = env.tool_log();
  assert_eq!(log.len(), 2);
  assert_eq!(
    log[0],
    "yosys -p synth_ice40 -p write_blif -attr -cname -param build/x/d/const.eblif const.v"
  );
  assert_eq!(
    log[1],
    "vpr /dev/d/arch.merged.xml const.eblif --device d --route_chan_width 6 --write_rr_graph const.rr_graph.xml"
  );
  assert!(env.exists("build/x/d/const.eblif"));
  assert!(env.exists("build/x/d/const.rr_graph.xml"));
}

#[test]
fn second_build_runs_nothing() {
  let env = TestEnv::new();
  env.write_file("const.v", CONST_V);

  env.build().arg("const.rr_graph.xml").assert().success();
  env
    .build()
    .arg("const.rr_graph.xml")
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing to be done"));

  assert_eq!(env.tool_log().len(), 2);
}

#[test]
fn eblif_source_is_copied() {
  let env = TestEnv::new();
  env.write_file("const.v", CONST_V);
  env.write_file("const.eblif", ".model top\n.end\n");

  env.build().arg("const.rr_graph.xml").assert().success();

  let log = env.tool_log();
  assert_eq!(log.len(), 1);
  assert!(log[0].starts_with("vpr "));
  assert_eq!(
    std::fs::read_to_string(env.root().join("build/x/d/const.eblif")).unwrap(),
    ".model top\n.end\n"
  );
}

#[test]
fn vpr_args_and_channel_width_reach_vpr() {
  let env = TestEnv::new();
  env.write_file("const.v", CONST_V);

  env
    .build()
    .arg("ROUTE_CHAN_WIDTH=10")
    .arg("VPR_ARGS=--seed 7 --verbose")
    .arg("const.rr_graph.xml")
    .assert()
    .success();

  let log = env.tool_log();
  assert!(log[1].contains("--route_chan_width 10"));
  assert!(log[1].ends_with("--write_rr_graph const.rr_graph.xml --seed 7 --verbose"));
}

#[test]
fn failing_tool_exit_code_is_propagated() {
  let env = TestEnv::new();
  env.write_file("const.v", CONST_V);

  env
    .build()
    .arg(assign("YOSYS", &env.tool("fail")))
    .arg("const.rr_graph.xml")
    .assert()
    .code(3)
    .stderr(predicate::str::contains("build/x/d/const.eblif"));

  // place-and-route never ran
  assert_eq!(env.tool_log().len(), 1);
  assert!(!env.exists("build/x/d/const.rr_graph.xml"));
}

#[test]
fn default_target_builds_every_test_case() {
  let env = TestEnv::new();
  env.write_file("and.v", CONST_V);
  env.write_file("wire.eblif", ".model wire\n.end\n");

  env
    .build()
    .assert()
    .success()
    .stdout(predicate::str::contains("smoke test and.rr_graph.xml"))
    .stdout(predicate::str::contains("smoke test wire.rr_graph.xml"));

  assert!(env.exists("build/x/d/and.rr_graph.xml"));
  assert!(env.exists("build/x/d/wire.rr_graph.xml"));
  assert_eq!(env.tool_log().len(), 3);
}

#[test]
fn failing_smoke_test_stops_the_run() {
  let env = TestEnv::new();
  env.write_file("a.v", CONST_V);
  env.write_file("b.v", CONST_V);

  env
    .build()
    .arg(assign("VPR", &env.tool("fail")))
    .arg("all")
    .assert()
    .code(3)
    .stderr(predicate::str::contains("smoke test 'a.rr_graph.xml' failed"));

  assert!(!env.exists("build/x/d/b.eblif"));
}

#[test]
fn clean_removes_build_tree() {
  let env = TestEnv::new();
  env.write_file("const.v", CONST_V);
  env.build().arg("const.rr_graph.xml").assert().success();
  assert!(env.exists("build"));

  env.build().arg("clean").assert().success();
  assert!(!env.exists("build"));
}

#[test]
fn patched_and_pretty_chain() {
  let env = TestEnv::new();
  env.write_file("const.v", CONST_V);

  env
    .build()
    .arg(assign("RR_PATCH", &env.tool("vpr")))
    .arg("XMLSORT=cat")
    .arg("const.patched.rr_graph.pretty.xml")
    .assert()
    .success();

  assert!(env.exists("build/x/d/const.patched.rr_graph.xml"));
  let pretty = std::fs::read_to_string(env.root().join("build/x/d/const.patched.rr_graph.pretty.xml")).unwrap();
  assert_eq!(pretty.trim(), "<rr_graph/>");
}

#[test]
fn plan_reports_up_to_date_after_build() {
  let env = TestEnv::new();
  env.write_file("const.v", CONST_V);
  env.build().arg("const.rr_graph.xml").assert().success();

  env
    .plan()
    .arg("const.rr_graph.xml")
    .assert()
    .success()
    .stdout(predicate::str::contains("Everything is up to date"));
}
