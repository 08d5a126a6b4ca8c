//! The built-in rule set.
//!
//! Artifact chain, per test-case stem:
//!
//! ```text
//! %.v / %.eblif (sources)
//!   -> build/<ARCH>/<DEVICE>/%.eblif               synthesis or copy
//!   -> build/<ARCH>/<DEVICE>/%.rr_graph.xml        place-and-route
//!   -> build/<ARCH>/<DEVICE>/%.patched.rr_graph.xml
//!   -> build/<ARCH>/<DEVICE>/%[.patched].rr_graph.pretty.xml
//! ```

use super::types::{Action, ExtraDep, Location, Rule, WorkDir};
use crate::consts::ARCH_MERGED_XML;

/// Place-and-route invocation shared by the route-graph rule and the debug wrappers.
const VPR: &str = "$${var:VPR} $${device_xml} $${in} --device $${var:DEVICE} --route_chan_width $${var:ROUTE_CHAN_WIDTH}";

pub(super) fn rules() -> Vec<Rule> {
  vec![
    Rule::phony_exact("all", Action::Aggregate).describe("build every smoke test (default)"),
    Rule::phony_exact("clean", Action::RemoveBuildTree).describe("remove the build/ tree"),
    Rule::phony_exact("help", Action::PrintHelp).describe("show this help"),
    Rule::file(
      "pretty",
      ".rr_graph.pretty.xml",
      Action::Command("$${var:XMLSORT} $${in} > $${out}".to_string()),
    )
    .from_source(".rr_graph.xml", Location::Output)
    .describe("canonicalized (sorted) route graph"),
    Rule::file(
      "patch",
      ".patched.rr_graph.xml",
      Action::Command(
        "$${var:RR_PATCH} --device $${var:DEVICE} --read_rr_graph $${in} --write_rr_graph $${out}".to_string(),
      ),
    )
    .from_source(".rr_graph.xml", Location::Output)
    .describe("route graph patched by the architecture patch tool"),
    Rule::file(
      "route-graph",
      ".rr_graph.xml",
      Action::Command(format!("{VPR} --write_rr_graph $${{out}} $${{raw:VPR_ARGS}}")),
    )
    .from_source(".eblif", Location::Output)
    .with_dep(ExtraDep::DeviceDefinition)
    .describe("route graph written by place-and-route"),
    Rule::file("eblif-copy", ".eblif", Action::Command("cp $${in} $${out}".to_string()))
      .from_source(".eblif", Location::Source)
      .in_dir(WorkDir::Root)
      .describe("test case given directly as eblif"),
    Rule::file(
      "synthesis",
      ".eblif",
      Action::Command(
        "$${var:YOSYS} -p $${var:YOSYS_SCRIPT} -p 'write_blif -attr -cname -param '$${out} $${in}".to_string(),
      ),
    )
    .from_source(".v", Location::Source)
    .in_dir(WorkDir::Root)
    .describe("test case synthesized from verilog"),
    Rule::phony_suffix("patched", ".patched", Action::Nothing)
      .from_source(".patched.rr_graph.xml", Location::Output)
      .describe("alias for %.patched.rr_graph.xml"),
    Rule::phony_suffix(
      "echo",
      ".echo",
      Action::Command(format!("{VPR} --echo_file on $${{raw:VPR_ARGS}}")),
    )
    .from_source(".eblif", Location::Output)
    .with_dep(ExtraDep::DeviceDefinition)
    .describe("run place-and-route with echo files enabled"),
    Rule::phony_suffix(
      "disp",
      ".disp",
      Action::Command(format!("{VPR} --disp on $${{raw:VPR_ARGS}}")),
    )
    .from_source(".eblif", Location::Output)
    .with_dep(ExtraDep::DeviceDefinition)
    .describe("run place-and-route with the graphics display"),
    Rule::phony_suffix(
      "gdb",
      ".gdb",
      Action::Command(format!("$${{var:GDB}} --args {VPR} $${{raw:VPR_ARGS}}")),
    )
    .from_source(".eblif", Location::Output)
    .with_dep(ExtraDep::DeviceDefinition)
    .describe("run place-and-route under the debugger"),
  ]
}

/// Generates a missing device definition inside its device-type directory.
pub(super) fn device_definition_rule() -> Rule {
  Rule::file(
    "device-definition",
    ARCH_MERGED_XML,
    Action::Command(format!("$${{var:MAKE}} {ARCH_MERGED_XML}")),
  )
  .in_dir(WorkDir::DeviceType)
  .describe("merged device definition")
}
