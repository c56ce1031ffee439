use chrono::NaiveDateTime;

use crate::probe::rtt::Rtt;
use crate::sampler::Sample;

const LINE_COLOR: &str = "#1f77b4";
const FAIL_COLOR: &str = "red";
const ONLINE_COLOR: &str = "#4CAF50";
const OFFLINE_COLOR: &str = "#FF5252";
const FRAME_COLOR: &str = "#333333";
const GRID_COLOR: &str = "#dddddd";

/// Latency floor shown on the y axis, so the sentinel markers for failed
/// ticks sit visibly below the zero line.
const Y_FLOOR: f64 = -2.0;

/// Renders the latency time series as an SVG document. Every tick gets a
/// marker on the series line; unreachable ticks are drawn at the sentinel
/// value and flagged with a red marker on top.
pub fn line_chart(samples: &[Sample], title: &str) -> String {
    let (width, height) = (1000.0, 500.0);
    let (left, right, top, bottom) = (80.0, 40.0, 60.0, 80.0);
    let plot_w = width - left - right;
    let plot_h = height - top - bottom;

    let mut svg = String::new();

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" \
         viewBox=\"0 0 {width} {height}\" font-family=\"sans-serif\">\n"
    ));
    svg.push_str(&format!(
        "<rect width=\"{width}\" height=\"{height}\" fill=\"white\"/>\n"
    ));
    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"30\" text-anchor=\"middle\" font-size=\"18\">{}</text>\n",
        width / 2.0,
        xml_escape(title)
    ));

    if samples.is_empty() {
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-size=\"16\" \
             fill=\"{FRAME_COLOR}\">no data</text>\n",
            left + plot_w / 2.0,
            top + plot_h / 2.0
        ));
        svg.push_str("</svg>\n");
        return svg;
    }

    // failed ticks plot at the sentinel value, like the recording
    let values: Vec<f64> = samples
        .iter()
        .map(|s| match s.rtt {
            Rtt::Millis(value) => value,
            Rtt::Unreachable => -1.0,
        })
        .collect();

    let y_min = Y_FLOOR;
    let y_max = values.iter().cloned().fold(f64::MIN, f64::max).max(1.0) * 1.05;

    let t0 = samples[0].timestamp;
    let span = (samples[samples.len() - 1].timestamp - t0)
        .num_seconds()
        .max(1) as f64;

    let x_for = |ts: NaiveDateTime| left + (ts - t0).num_seconds() as f64 / span * plot_w;
    let y_for = |v: f64| top + (1.0 - (v - y_min) / (y_max - y_min)) * plot_h;

    // horizontal grid and y axis labels
    for i in 0..=5 {
        let value = y_min + (y_max - y_min) * i as f64 / 5.0;
        let y = y_for(value);

        svg.push_str(&format!(
            "<line x1=\"{left:.1}\" y1=\"{y:.1}\" x2=\"{:.1}\" y2=\"{y:.1}\" \
             stroke=\"{GRID_COLOR}\"/>\n",
            left + plot_w
        ));
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" font-size=\"12\">{value:.1}</text>\n",
            left - 8.0,
            y + 4.0
        ));
    }

    // vertical grid and time labels
    let ticks = samples.len().min(6);

    for i in 0..ticks {
        let index = if ticks == 1 {
            0
        } else {
            i * (samples.len() - 1) / (ticks - 1)
        };
        let x = x_for(samples[index].timestamp);

        svg.push_str(&format!(
            "<line x1=\"{x:.1}\" y1=\"{top:.1}\" x2=\"{x:.1}\" y2=\"{:.1}\" \
             stroke=\"{GRID_COLOR}\"/>\n",
            top + plot_h
        ));
        svg.push_str(&format!(
            "<text x=\"{x:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-size=\"12\">{}</text>\n",
            top + plot_h + 20.0,
            samples[index].timestamp.format("%H:%M:%S")
        ));
    }

    svg.push_str(&format!(
        "<rect x=\"{left:.1}\" y=\"{top:.1}\" width=\"{plot_w:.1}\" height=\"{plot_h:.1}\" \
         fill=\"none\" stroke=\"{FRAME_COLOR}\"/>\n"
    ));

    // axis labels
    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-size=\"14\">Time</text>\n",
        left + plot_w / 2.0,
        height - 25.0
    ));
    svg.push_str(&format!(
        "<text x=\"24\" y=\"{mid:.1}\" text-anchor=\"middle\" font-size=\"14\" \
         transform=\"rotate(-90 24 {mid:.1})\">Round-Trip Time (ms)</text>\n",
        mid = top + plot_h / 2.0
    ));

    // series line
    if samples.len() > 1 {
        let points: Vec<String> = samples
            .iter()
            .zip(values.iter())
            .map(|(s, v)| format!("{:.1},{:.1}", x_for(s.timestamp), y_for(*v)))
            .collect();

        svg.push_str(&format!(
            "<polyline fill=\"none\" stroke=\"{LINE_COLOR}\" stroke-width=\"1.5\" points=\"{}\"/>\n",
            points.join(" ")
        ));
    }

    // one marker per tick, red on top for failed ticks
    for (sample, value) in samples.iter().zip(values.iter()) {
        svg.push_str(&format!(
            "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"3.5\" fill=\"{LINE_COLOR}\"/>\n",
            x_for(sample.timestamp),
            y_for(*value)
        ));
    }

    for (sample, value) in samples.iter().zip(values.iter()) {
        if !sample.rtt.is_reachable() {
            svg.push_str(&format!(
                "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"4.5\" fill=\"{FAIL_COLOR}\"/>\n",
                x_for(sample.timestamp),
                y_for(*value)
            ));
        }
    }

    // legend
    let (legend_x, legend_y) = (left + plot_w - 150.0, top + 10.0);

    svg.push_str(&format!(
        "<rect x=\"{legend_x:.1}\" y=\"{legend_y:.1}\" width=\"140\" height=\"46\" \
         fill=\"white\" stroke=\"{FRAME_COLOR}\"/>\n"
    ));
    svg.push_str(&format!(
        "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"3.5\" fill=\"{LINE_COLOR}\"/>\n",
        legend_x + 16.0,
        legend_y + 14.0
    ));
    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"12\">RTT</text>\n",
        legend_x + 28.0,
        legend_y + 18.0
    ));
    svg.push_str(&format!(
        "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"4.5\" fill=\"{FAIL_COLOR}\"/>\n",
        legend_x + 16.0,
        legend_y + 32.0
    ));
    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"12\">Failed Ping</text>\n",
        legend_x + 28.0,
        legend_y + 36.0
    ));

    svg.push_str("</svg>\n");
    svg
}

/// Renders the online/offline split as an SVG pie, green for ticks where the
/// host answered and red for the rest.
pub fn uptime_pie(online: usize, offline: usize, title: &str) -> String {
    let (width, height) = (600.0, 640.0);
    let (cx, cy, r) = (300.0, 330.0, 200.0);

    let mut svg = String::new();

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" \
         viewBox=\"0 0 {width} {height}\" font-family=\"sans-serif\">\n"
    ));
    svg.push_str(&format!(
        "<rect width=\"{width}\" height=\"{height}\" fill=\"white\"/>\n"
    ));
    svg.push_str(&format!(
        "<text x=\"{cx:.1}\" y=\"30\" text-anchor=\"middle\" font-size=\"18\">{}</text>\n",
        xml_escape(title)
    ));

    let total = online + offline;

    if total == 0 {
        svg.push_str(&format!(
            "<text x=\"{cx:.1}\" y=\"{cy:.1}\" text-anchor=\"middle\" font-size=\"16\" \
             fill=\"{FRAME_COLOR}\">no data</text>\n"
        ));
        svg.push_str("</svg>\n");
        return svg;
    }

    let online_pct = online as f64 / total as f64 * 100.0;
    let offline_pct = offline as f64 / total as f64 * 100.0;

    if offline == 0 {
        full_circle(&mut svg, cx, cy, r, ONLINE_COLOR, "Online", online_pct);
    } else if online == 0 {
        full_circle(&mut svg, cx, cy, r, OFFLINE_COLOR, "Offline", offline_pct);
    } else {
        // slices start at twelve o'clock and run clockwise
        let online_sweep = online as f64 / total as f64 * 360.0;
        let offline_sweep = 360.0 - online_sweep;

        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"{ONLINE_COLOR}\"/>\n",
            slice_path(cx, cy, r, -90.0, online_sweep)
        ));
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"{OFFLINE_COLOR}\"/>\n",
            slice_path(cx, cy, r, -90.0 + online_sweep, offline_sweep)
        ));

        slice_labels(&mut svg, cx, cy, r, -90.0 + online_sweep / 2.0, "Online", online_pct);
        slice_labels(
            &mut svg,
            cx,
            cy,
            r,
            -90.0 + online_sweep + offline_sweep / 2.0,
            "Offline",
            offline_pct,
        );
    }

    svg.push_str("</svg>\n");
    svg
}

fn full_circle(svg: &mut String, cx: f64, cy: f64, r: f64, color: &str, name: &str, pct: f64) {
    svg.push_str(&format!(
        "<circle cx=\"{cx:.1}\" cy=\"{cy:.1}\" r=\"{r:.1}\" fill=\"{color}\"/>\n"
    ));
    svg.push_str(&format!(
        "<text x=\"{cx:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-size=\"20\" \
         fill=\"white\">{pct:.1}%</text>\n",
        cy - r * 0.55
    ));
    svg.push_str(&format!(
        "<text x=\"{cx:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-size=\"16\" \
         fill=\"{FRAME_COLOR}\">{name}</text>\n",
        cy - r - 16.0
    ));
}

fn slice_labels(svg: &mut String, cx: f64, cy: f64, r: f64, mid: f64, name: &str, pct: f64) {
    let (px, py) = polar(cx, cy, r * 0.55, mid);
    let (nx, ny) = polar(cx, cy, r * 1.15, mid);

    svg.push_str(&format!(
        "<text x=\"{px:.1}\" y=\"{py:.1}\" text-anchor=\"middle\" font-size=\"20\" \
         fill=\"white\">{pct:.1}%</text>\n"
    ));
    svg.push_str(&format!(
        "<text x=\"{nx:.1}\" y=\"{ny:.1}\" text-anchor=\"middle\" font-size=\"16\" \
         fill=\"{FRAME_COLOR}\">{name}</text>\n"
    ));
}

fn slice_path(cx: f64, cy: f64, r: f64, start: f64, sweep: f64) -> String {
    let (x1, y1) = polar(cx, cy, r, start);
    let (x2, y2) = polar(cx, cy, r, start + sweep);
    let large_arc = if sweep > 180.0 { 1 } else { 0 };

    format!("M{cx:.1} {cy:.1} L{x1:.1} {y1:.1} A{r:.1} {r:.1} 0 {large_arc} 1 {x2:.1} {y2:.1} Z")
}

fn polar(cx: f64, cy: f64, r: f64, deg: f64) -> (f64, f64) {
    let rad = deg.to_radians();
    (cx + r * rad.cos(), cy + r * rad.sin())
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }

    escaped
}
