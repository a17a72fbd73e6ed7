use crate::render::RenderTree;
use crate::types::Mode;
use std::fmt::Write;

const SCRIPT: &str = include_str!("../assets/fretboard.js");

/// The host page: centered board, mode selector, chord button, relay script.
pub fn build_page(tree: &RenderTree, initial_mode: Mode) -> String {
    let mut options = String::new();
    for m in Mode::ALL {
        let selected = if m == initial_mode { " selected" } else { "" };
        let _ = write!(options, r#"<option value="{m}"{selected}>{m}</option>"#);
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Fretboard</title>
<style>
  body {{ background: #222; color: #eee; font-family: sans-serif; margin: 24px; }}
  .target {{ cursor: pointer; }}
  select, button {{ margin: 12px 6px; font-size: 16px; }}
</style>
</head>
<body>
<div id="guitar">
<center>
{svg}<br>
<select name="mode" id="mode_sel">{options}</select>
<button type="button" id="chord_btn">CHORD!</button>
</center>
</div>
<script>
{script}
</script>
</body>
</html>
"#,
        svg = tree.to_svg(),
        options = options,
        script = SCRIPT,
    )
}
