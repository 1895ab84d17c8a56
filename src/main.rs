use topoview::layout::ForceConfig;
use topoview::svg::SvgBackend;
use topoview::Viewer;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h" || args[1] == "help") {
        print_help();
        return;
    }
    if args.len() >= 2 && args[1] == "replay" {
        let Some(path) = args.get(2) else {
            eprintln!("replay needs a file of frames");
            print_help();
            std::process::exit(2);
        };
        run_replay(path);
        return;
    }

    if args.len() >= 2 {
        eprintln!("Unknown command: {}", args[1]);
        print_help();
        std::process::exit(2);
    }

    // Minimal demo:
    // - four switches in a ring plus a chord, announced the way the backend
    //   does it (one direction per frame, some links before their nodes)
    // - the layout runs until it settles
    // - the resulting scene is printed as SVG
    let mut viewer = new_viewer();
    for frame in demo_frames() {
        if let Err(e) = viewer.handle_frame(&frame) {
            eprintln!("bad demo frame: {}", e);
        }
    }
    settle(&mut viewer);

    eprintln!(
        "nodes={} links={} pending={}",
        viewer.topology().nodes().len(),
        viewer.topology().links().len(),
        viewer.topology().pending_links().len()
    );
    println!("{}", viewer.backend().render());
}

fn print_help() {
    println!("topoview (topology layout and rendering)");
    println!("usage:");
    println!("  cargo run");
    println!("  cargo run -- replay <frames.jsonl>");
    println!("  cargo run -- --help");
}

fn new_viewer() -> Viewer<SvgBackend> {
    let cfg = ForceConfig {
        seed: Some(1),
        ..ForceConfig::default()
    };
    Viewer::new(cfg, SvgBackend::new(cfg.width, cfg.height, "./router.svg"))
}

fn settle(viewer: &mut Viewer<SvgBackend>) {
    for _ in 0..2000 {
        if viewer.layout().is_settled() {
            break;
        }
        viewer.tick();
    }
}

fn run_replay(path: &str) {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("cannot read {}: {}", path, e);
            std::process::exit(1);
        }
    };

    let mut viewer = new_viewer();
    let mut replied = 0usize;
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match viewer.handle_frame(line) {
            Ok(_) => replied += 1,
            Err(e) => eprintln!("line {}: {}", lineno + 1, e),
        }
    }
    settle(&mut viewer);

    eprintln!("applied {} frames", replied);
    println!("{}", viewer.backend().render());
}

fn demo_frames() -> Vec<String> {
    let dpid = |v: u64| format!("{:016x}", v);
    let mut frames = Vec::new();
    let mut id = 0u64;
    let mut push = |method: &str, params: serde_json::Value| {
        id += 1;
        frames.push(
            serde_json::json!({"id": id, "method": method, "params": params}).to_string(),
        );
    };

    // link announced before its second endpoint exists
    push(
        "event_link_add",
        serde_json::json!([{
            "src": {"dpid": dpid(4), "port_no": "00000001"},
            "dst": {"dpid": dpid(1), "port_no": "00000002"}
        }]),
    );
    for v in 1..=4u64 {
        push(
            "event_switch_enter",
            serde_json::json!([{
                "dpid": dpid(v),
                "ports": [
                    {"port_no": "00000001", "name": format!("s{}-eth1", v)},
                    {"port_no": "00000002", "name": format!("s{}-eth2", v)}
                ]
            }]),
        );
    }
    for (a, b) in [(1u64, 2u64), (2, 3), (3, 4), (1, 3)] {
        // both directions, as the backend reports them
        for (s, d) in [(a, b), (b, a)] {
            push(
                "event_link_add",
                serde_json::json!([{
                    "src": {"dpid": dpid(s), "port_no": format!("{:08x}", d + 2)},
                    "dst": {"dpid": dpid(d), "port_no": format!("{:08x}", s + 2)}
                }]),
            );
        }
    }
    frames
}
