//! Request routing for `blink1-server`.
//!
//! [`Server::handle`] maps one GET URL to a JSON reply. It owns the device
//! registry and the in-memory pattern table; the socket loop lives in
//! `main_server.rs` and calls [`Server::flush_idle`] between requests.

use std::borrow::Cow;
use std::time::Duration;

use log::{info, warn};
use serde::Serialize;
use serde_json::{Map, Value, json};

use blink1_lib::blink1::Blink1;
use blink1_lib::config::Config;
use blink1_lib::device::Transport;
use blink1_lib::error::{Blink1Error, Result};
use blink1_lib::led::{self, Pattern, PatternLine, PatternTable, Rgb};
use blink1_lib::player;
use blink1_lib::registry::{DeviceList, DeviceRegistry};
use blink1_lib::report::ServerTickle;

const SERVER_NAME: &str = "blink1-server";
const VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

/// Fade time when a request gives neither `millis` nor `time`.
const DEFAULT_MILLIS: u32 = 100;
/// Last tickle line when `end` is missing or zero.
const TICKLE_DEFAULT_END: u8 = 15;

const SUPPORTED_URIS: &[(&str, &str)] = &[
    ("/blink1/", "simple status page"),
    ("/blink1/id", "list serial numbers of connected devices"),
    ("/blink1/on", "turn blink(1) full bright white"),
    ("/blink1/off", "turn blink(1) off"),
    ("/blink1/red", "turn blink(1) solid red"),
    ("/blink1/green", "turn blink(1) solid green"),
    ("/blink1/blue", "turn blink(1) solid blue"),
    ("/blink1/cyan", "turn blink(1) solid cyan"),
    ("/blink1/magenta", "turn blink(1) solid magenta"),
    ("/blink1/yellow", "turn blink(1) solid yellow"),
    ("/blink1/fadeToRGB", "turn blink(1) specified RGB color"),
    ("/blink1/blink", "blink the blink(1) the specified RGB color"),
    ("/blink1/random", "turn the blink(1) a random color"),
    ("/blink1/lastColor", "last color set through this server"),
    ("/blink1/patterns", "list available patterns"),
    ("/blink1/pattern/play", "play a pattern by 'pname' or 'pattern'"),
    ("/blink1/pattern/stop", "stop pattern playback"),
    ("/blink1/pattern/add", "add a pattern 'pattern' named 'pname'"),
    ("/blink1/pattern/del", "delete the pattern named 'pname'"),
    ("/blink1/servertickle/on", "arm the server-down watchdog"),
    ("/blink1/servertickle/off", "disarm the server-down watchdog"),
];

// ── Query parameters ──

/// Query arguments. Malformed numbers read as zero, malformed colors as
/// black.
#[derive(Debug, Clone)]
struct Params {
    millis: u32,
    rgb: Rgb,
    count: i64,
    count_given: bool,
    ledn: u8,
    bright: u8,
    id: DeviceList,
    pattern: Option<String>,
    pname: Option<String>,
    stay_lit: bool,
    start: u8,
    end: u8,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            millis: DEFAULT_MILLIS,
            rgb: Rgb::BLACK,
            count: 1,
            count_given: false,
            ledn: 0,
            bright: 0,
            id: DeviceList::default(),
            pattern: None,
            pname: None,
            stay_lit: false,
            start: 0,
            end: 0,
        }
    }
}

fn lenient_float(s: &str) -> f64 {
    s.trim().parse().unwrap_or(0.0)
}

fn lenient_u8(s: &str) -> u8 {
    led::leading_number(s).clamp(0, u8::MAX as i64) as u8
}

impl Params {
    /// `time` (seconds) wins over `millis` when both are present.
    fn parse(query: &str) -> Params {
        let mut p = Params::default();
        let mut time = None;
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let v: &str = &value;
            match key.as_ref() {
                "millis" => p.millis = lenient_float(v) as u32,
                "time" => time = Some(lenient_float(v)),
                "rgb" => p.rgb = led::parse_color(v),
                "count" => {
                    p.count = led::leading_number(v);
                    p.count_given = true;
                }
                "ledn" => p.ledn = lenient_u8(v),
                "bright" => p.bright = lenient_u8(v),
                "id" => p.id = DeviceList::parse(v),
                "pattern" => p.pattern = Some(v.to_string()),
                "pname" => p.pname = Some(v.to_string()),
                "st" => p.stay_lit = matches!(v, "1" | "on" | "true"),
                "start" => p.start = lenient_u8(v),
                "end" => p.end = lenient_u8(v),
                _ => {}
            }
        }
        if let Some(secs) = time {
            p.millis = (secs * 1000.0) as u32;
        }
        p
    }
}

// ── Replies ──

/// HTTP status plus JSON body.
#[derive(Debug)]
pub struct Reply {
    pub code: u16,
    pub body: Value,
}

/// Fields common to every reply; routes add extras.
struct Body {
    uri: String,
    status: String,
    rgb: Rgb,
    millis: u32,
    bright: u8,
    ledn: u8,
    count: i64,
    extra: Map<String, Value>,
}

impl Body {
    fn new(uri: &str, p: &Params) -> Body {
        Body {
            uri: uri.to_string(),
            status: String::new(),
            rgb: p.rgb,
            millis: p.millis,
            bright: p.bright,
            ledn: p.ledn,
            count: p.count,
            extra: Map::new(),
        }
    }

    fn set(&mut self, key: &str, value: impl Serialize) {
        let v = serde_json::to_value(value).unwrap_or(Value::Null);
        self.extra.insert(key.to_string(), v);
    }

    /// Append an error to the status text.
    fn fail(&mut self, e: &Blink1Error) {
        self.status = if e.is_no_device() {
            format!("{}: error, couldn't find blink1", self.status)
        } else {
            format!("{}: error: {e}", self.status)
        };
    }

    fn into_json(self) -> Value {
        let mut obj = json!({
            "uri": self.uri,
            "status": self.status,
            "rgb": self.rgb.to_string(),
            "millis": self.millis,
            "bright": self.bright,
            "ledn": self.ledn,
            "count": self.count,
            "version": VERSION,
        });
        if let Value::Object(map) = &mut obj {
            map.extend(self.extra);
        }
        obj
    }
}

// ── Server ──

pub struct Server<T: Transport> {
    registry: DeviceRegistry<T>,
    patterns: PatternTable,
    last_color: Rgb,
    idle_close: Duration,
}

impl<T: Transport> Server<T> {
    pub fn new(transport: T, config: &Config) -> Self {
        let mut registry =
            DeviceRegistry::new(transport).with_ids(config.vendor_id, config.product_id);
        registry.set_degamma(config.degamma);
        registry.set_keep_warm(config.server.idle_close_millis > 0);
        Server {
            registry,
            patterns: config.pattern_table(),
            last_color: Rgb::BLACK,
            idle_close: Duration::from_millis(config.server.idle_close_millis),
        }
    }

    #[cfg(test)]
    fn registry(&self) -> &DeviceRegistry<T> {
        &self.registry
    }

    /// Close device handles idle longer than the configured limit.
    pub fn flush_idle(&mut self) -> usize {
        self.registry.flush(self.idle_close)
    }

    /// Route one request URL (path plus optional query string).
    pub fn handle(&mut self, url: &str) -> Reply {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        let p = Params::parse(query);
        let mut body = Body::new(path, &p);
        let code = self.route(path, &p, &mut body);
        info!("GET {path} -> {code} {}", body.status);
        Reply {
            code,
            body: body.into_json(),
        }
    }

    fn route(&mut self, path: &str, p: &Params, body: &mut Body) -> u16 {
        match path {
            "/" => self.help(body),
            "/blink1" | "/blink1/" => {
                body.status = "blink1 status".into();
                let serials = self.serials();
                body.set("blink1_count", serials.len());
                body.set("blink1_serialnums", serials);
            }
            "/blink1/id" => {
                body.status = "blink1 id".into();
                let serials = self.serials();
                if let Some(first) = serials.first() {
                    body.set("blink1_id", first);
                }
                body.set("blink1_serialnums", serials);
            }
            "/blink1/fadeToRGB" => {
                body.status = "blink1 fadeToRGB".into();
                self.set_color(p, p.rgb, body);
            }
            "/blink1/blink" => {
                body.status = "blink1 blink".into();
                self.blink(p, body);
            }
            "/blink1/random" => {
                body.status = "blink1 random".into();
                self.random(p, body);
            }
            "/blink1/lastColor" => {
                body.status = "blink1 lastColor".into();
                body.rgb = self.last_color;
            }
            "/blink1/patterns" | "/blink1/pattern" => {
                body.status = "blink1 patterns".into();
                body.set("patterns", self.patterns.entries());
            }
            "/blink1/pattern/play" => {
                body.status = "blink1 pattern play".into();
                self.play_pattern(p, body);
            }
            "/blink1/pattern/stop" => {
                body.status = "blink1 pattern stop".into();
                if let Err(e) = self.on_devices(p, player::stop) {
                    body.fail(&e);
                }
            }
            "/blink1/pattern/add" => {
                body.status = "blink1 pattern add".into();
                self.add_pattern(p, body);
            }
            "/blink1/pattern/del" => {
                body.status = "blink1 pattern del".into();
                self.del_pattern(p, body);
            }
            "/blink1/servertickle/on" | "/blink1/servertickle/off" => {
                let enabled = path.ends_with("/on");
                body.status = format!("blink1 servertickle {}", if enabled { "on" } else { "off" });
                self.server_tickle(p, enabled, body);
            }
            _ => match path.strip_prefix("/blink1/").and_then(led::named_color) {
                Some(color) => {
                    body.status = format!("blink1 {}", &path["/blink1/".len()..]);
                    self.set_color(p, color, body);
                }
                None => {
                    body.status = "unrecognized uri".into();
                    return 404;
                }
            },
        }
        200
    }

    fn help(&self, body: &mut Body) {
        body.status = format!(
            "Welcome to {SERVER_NAME} api server. All URIs start with '/blink1'."
        );
        let uris: Vec<Value> = SUPPORTED_URIS
            .iter()
            .map(|(uri, desc)| json!({ "uri": uri, "desc": desc }))
            .collect();
        body.set("supported_uris", uris);
        body.set(
            "query_args",
            ["rgb", "time", "millis", "bright", "ledn", "count", "id", "pname", "pattern"],
        );
    }

    fn serials(&mut self) -> Vec<String> {
        match self.registry.enumerate() {
            Ok(_) => self.registry.entries().into_iter().map(|e| e.serial).collect(),
            Err(e) => {
                warn!("enumerate: {e}");
                Vec::new()
            }
        }
    }

    /// Run `f` on every device the request selects.
    fn on_devices(
        &mut self,
        p: &Params,
        mut f: impl FnMut(&Blink1<'_, T>) -> Result<()>,
    ) -> Result<()> {
        if p.id == DeviceList::All {
            self.registry.enumerate()?;
        }
        for sel in p.id.selectors(self.registry.count()) {
            self.registry.with_device(&sel, &mut f)?;
        }
        Ok(())
    }

    fn set_color(&mut self, p: &Params, color: Rgb, body: &mut Body) {
        if p.id == DeviceList::All {
            if let Err(e) = self.registry.enumerate() {
                body.fail(&e);
                return;
            }
        }
        let sels = p.id.selectors(self.registry.count());
        match led::apply_color_all(&mut self.registry, &sels, color, p.millis, p.ledn, p.bright) {
            Ok(sent) => {
                self.last_color = sent;
                body.rgb = sent;
            }
            Err(e) => body.fail(&e),
        }
    }

    /// On/off loop played by the device itself, `count` times.
    fn blink(&mut self, p: &Params, body: &mut Body) {
        let color = if p.rgb.is_black() { Rgb::WHITE } else { p.rgb };
        let half = (p.millis / 2).min(u16::MAX as u32) as u16;
        let pattern = Pattern {
            repeats: 1,
            lines: vec![
                PatternLine {
                    color,
                    millis: half,
                    ledn: p.ledn,
                },
                PatternLine {
                    color: Rgb::BLACK,
                    millis: half,
                    ledn: p.ledn,
                },
            ],
        }
        .with_repeats(p.count);
        let bright = p.bright;
        match self.on_devices(p, |dev| player::play_on_device(dev, &pattern, bright)) {
            Ok(()) => {
                body.rgb = led::adjust_brightness(bright, color);
                self.last_color = body.rgb;
            }
            Err(e) => body.fail(&e),
        }
    }

    /// One random color; with `count` > 1 the device plays that many
    /// random colors from its pattern memory.
    fn random(&mut self, p: &Params, body: &mut Body) {
        let mut rng = rand::rng();
        if p.count <= 1 {
            self.set_color(p, Rgb::random(&mut rng), body);
            return;
        }
        let count = p.count as usize;
        let millis = p.millis.min(u16::MAX as u32) as u16;
        let (ledn, bright) = (p.ledn, p.bright);
        let mut last = Rgb::BLACK;
        let result = self.on_devices(p, |dev| {
            let n = count.min(dev.revision().pattern_capacity() as usize);
            let lines: Vec<PatternLine> = led::random_colors(&mut rng, n)
                .into_iter()
                .map(|color| PatternLine {
                    color,
                    millis,
                    ledn,
                })
                .collect();
            last = lines.last().map(|l| l.color).unwrap_or_default();
            player::play_on_device(dev, &Pattern { repeats: 1, lines }, bright)
        });
        match result {
            Ok(()) => {
                body.rgb = led::adjust_brightness(bright, last);
                self.last_color = body.rgb;
            }
            Err(e) => body.fail(&e),
        }
    }

    fn play_pattern(&mut self, p: &Params, body: &mut Body) {
        let text: Cow<'_, str> = match (&p.pname, &p.pattern) {
            (Some(name), _) => {
                body.set("pname", name);
                match self.patterns.find(name) {
                    Some(t) => Cow::Owned(t.to_string()),
                    None => {
                        body.fail(&Blink1Error::Pattern(format!("no pattern named '{name}'")));
                        return;
                    }
                }
            }
            (None, Some(t)) => Cow::Borrowed(t),
            (None, None) => {
                body.fail(&Blink1Error::Argument("need 'pname' or 'pattern'".into()));
                return;
            }
        };
        let mut pattern = Pattern::parse(&text);
        if p.count_given {
            pattern = pattern.with_repeats(p.count);
        }
        body.count = pattern.repeats.max(0) as i64;
        body.set("pattern", pattern.to_string());

        let bright = p.bright;
        if let Err(e) = self.on_devices(p, |dev| player::play_on_device(dev, &pattern, bright)) {
            body.fail(&e);
        }
    }

    fn add_pattern(&mut self, p: &Params, body: &mut Body) {
        let (Some(name), Some(pattern)) = (&p.pname, &p.pattern) else {
            body.fail(&Blink1Error::Argument("need 'pname' and 'pattern'".into()));
            return;
        };
        body.set("pname", name);
        body.set("pattern", pattern);
        if let Err(e) = self.patterns.add(name, pattern) {
            body.fail(&e);
        }
    }

    fn del_pattern(&mut self, p: &Params, body: &mut Body) {
        let Some(name) = &p.pname else {
            body.fail(&Blink1Error::Argument("need 'pname'".into()));
            return;
        };
        body.set("pname", name);
        if !self.patterns.remove(name) {
            body.fail(&Blink1Error::Pattern(format!("no pattern named '{name}'")));
        }
    }

    fn server_tickle(&mut self, p: &Params, enabled: bool, body: &mut Body) {
        let tickle = ServerTickle {
            enabled,
            millis: p.millis,
            stay_lit: p.stay_lit,
            start: p.start,
            end: if p.end == 0 { TICKLE_DEFAULT_END } else { p.end },
        };
        body.set("st", tickle.stay_lit);
        body.set("start", tickle.start);
        body.set("end", tickle.end);
        if let Err(e) = self.on_devices(p, |dev| dev.server_tickle(tickle)) {
            body.fail(&e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blink1_lib::device::mock::MockTransport;

    fn server(serials: &[&str]) -> Server<MockTransport> {
        let config = Config {
            degamma: false,
            ..Config::default()
        };
        Server::new(MockTransport::with_serials(serials), &config)
    }

    fn led0(s: &Server<MockTransport>, serial: &str) -> Rgb {
        s.registry().transport().state(serial).unwrap().leds[0]
    }

    // ── Params ──

    #[test]
    fn params_defaults() {
        let p = Params::parse("");
        assert_eq!(p.millis, 100);
        assert_eq!(p.count, 1);
        assert!(!p.count_given);
        assert_eq!(p.rgb, Rgb::BLACK);
    }

    #[test]
    fn params_time_overrides_millis() {
        let p = Params::parse("millis=300&time=1.5");
        assert_eq!(p.millis, 1500);
        let p = Params::parse("time=0.25&millis=300");
        assert_eq!(p.millis, 250);
    }

    #[test]
    fn params_decode_escapes_and_junk() {
        let p = Params::parse("rgb=%23ff8000&ledn=2&bright=abc&pname=red+flash");
        assert_eq!(p.rgb, Rgb::new(255, 128, 0));
        assert_eq!(p.ledn, 2);
        assert_eq!(p.bright, 0);
        assert_eq!(p.pname.as_deref(), Some("red flash"));
    }

    // ── Color routes ──

    #[test]
    fn fade_to_rgb_reports_fields() {
        let mut s = server(&["20000001"]);
        let r = s.handle("/blink1/fadeToRGB?rgb=%23ff00ff&time=1.0&ledn=1");
        assert_eq!(r.code, 200);
        assert_eq!(r.body["status"], "blink1 fadeToRGB");
        assert_eq!(r.body["rgb"], "#ff00ff");
        assert_eq!(r.body["millis"], 1000);
        assert_eq!(r.body["ledn"], 1);
        assert_eq!(r.body["version"], VERSION);
        let st = s.registry().transport().state("20000001").unwrap();
        assert_eq!(st.leds[1], Rgb::new(255, 0, 255));
        assert_eq!(st.last_fade_millis, 1000);
    }

    #[test]
    fn named_routes_apply_brightness() {
        let mut s = server(&["20000001"]);
        let r = s.handle("/blink1/blue?bright=128");
        assert_eq!(r.body["status"], "blink1 blue");
        assert_eq!(r.body["rgb"], "#00007f");
        assert_eq!(led0(&s, "20000001"), Rgb::new(0, 0, 127));
    }

    #[test]
    fn no_device_is_reported_in_status() {
        let mut s = server(&[]);
        let r = s.handle("/blink1/on");
        assert_eq!(r.code, 200);
        assert_eq!(r.body["status"], "blink1 on: error, couldn't find blink1");
        assert_eq!(s.registry().transport().write_count(), 0);
    }

    #[test]
    fn last_color_tracks_changes() {
        let mut s = server(&["20000001"]);
        s.handle("/blink1/red");
        let r = s.handle("/blink1/lastColor");
        assert_eq!(r.body["rgb"], "#ff0000");
    }

    #[test]
    fn id_all_selects_every_device() {
        let mut s = server(&["20000001", "20000002"]);
        s.handle("/blink1/green?id=all");
        assert_eq!(led0(&s, "20000001"), Rgb::new(0, 255, 0));
        assert_eq!(led0(&s, "20000002"), Rgb::new(0, 255, 0));
    }

    // ── Effects ──

    #[test]
    fn blink_plays_on_device() {
        let mut s = server(&["20000001"]);
        let r = s.handle("/blink1/blink?rgb=%23ff0000&millis=500&count=3");
        assert_eq!(r.body["status"], "blink1 blink");
        let st = s.registry().transport().state("20000001").unwrap();
        assert_eq!(st.pattern[0].color, Rgb::new(255, 0, 0));
        assert_eq!(st.pattern[0].millis, 250);
        assert_eq!(st.pattern[1].color, Rgb::BLACK);
        assert!(st.play.playing);
        assert_eq!((st.play.end, st.play.count), (1, 3));
    }

    #[test]
    fn blink_black_blinks_white() {
        let mut s = server(&["20000001"]);
        s.handle("/blink1/blink");
        let st = s.registry().transport().state("20000001").unwrap();
        assert_eq!(st.pattern[0].color, Rgb::WHITE);
    }

    #[test]
    fn random_single_color_fades() {
        let mut s = server(&["20000001"]);
        s.handle("/blink1/random");
        let st = s.registry().transport().state("20000001").unwrap();
        assert!(!st.play.playing);
        assert_eq!(s.registry().transport().commands().len(), 1);
    }

    #[test]
    fn random_many_colors_play_on_device() {
        let mut s = server(&["20000001"]);
        s.handle("/blink1/random?count=40");
        let st = s.registry().transport().state("20000001").unwrap();
        assert!(st.play.playing);
        // capped at the mk2 pattern capacity
        assert_eq!(st.play.end, 15);
    }

    // ── Patterns ──

    #[test]
    fn patterns_list_builtins() {
        let mut s = server(&[]);
        let r = s.handle("/blink1/patterns");
        let list = r.body["patterns"].as_array().unwrap();
        assert!(list.iter().any(|p| p["name"] == "red flash"
            && p["pattern"] == "9,#ff0000,0.5,0,#000000,0.5,0"));
        assert!(s.handle("/blink1/pattern").body["patterns"].is_array());
    }

    #[test]
    fn pattern_play_by_name_with_count() {
        let mut s = server(&["20000001"]);
        let r = s.handle("/blink1/pattern/play?pname=red+flash&count=3");
        assert_eq!(r.body["status"], "blink1 pattern play");
        assert_eq!(r.body["pname"], "red flash");
        assert_eq!(r.body["count"], 3);
        assert_eq!(r.body["pattern"], "3,#ff0000,0.50,0,#000000,0.50,0");
        let st = s.registry().transport().state("20000001").unwrap();
        assert_eq!(st.play.count, 3);
    }

    #[test]
    fn pattern_play_unknown_name() {
        let mut s = server(&["20000001"]);
        let r = s.handle("/blink1/pattern/play?pname=nope");
        assert!(r.body["status"].as_str().unwrap().contains("no pattern named"));
        assert_eq!(s.registry().transport().write_count(), 0);
    }

    #[test]
    fn pattern_add_then_delete() {
        let mut s = server(&[]);
        let r = s.handle("/blink1/pattern/add?pname=todtest&pattern=3,%23FF00FF,0.5,0,%23000000,0.5,0");
        assert_eq!(r.body["status"], "blink1 pattern add");
        assert_eq!(r.body["pattern"], "3,#FF00FF,0.5,0,#000000,0.5,0");
        let list = s.handle("/blink1/patterns").body["patterns"].clone();
        assert!(list.as_array().unwrap().iter().any(|p| p["name"] == "todtest"));

        let r = s.handle("/blink1/pattern/del?pname=todtest");
        assert_eq!(r.body["status"], "blink1 pattern del");
        let list = s.handle("/blink1/patterns").body["patterns"].clone();
        assert!(!list.as_array().unwrap().iter().any(|p| p["name"] == "todtest"));
    }

    #[test]
    fn pattern_add_rejects_bad_pattern() {
        let mut s = server(&[]);
        let r = s.handle("/blink1/pattern/add?pname=bad&pattern=3,%23FF00FF");
        assert!(r.body["status"].as_str().unwrap().contains("error"));
    }

    #[test]
    fn pattern_stop() {
        let mut s = server(&["20000001"]);
        s.handle("/blink1/pattern/play?pname=policecar");
        s.handle("/blink1/pattern/stop");
        assert!(!s.registry().transport().state("20000001").unwrap().play.playing);
    }

    // ── Status / misc ──

    #[test]
    fn id_lists_serials() {
        let mut s = server(&["20000002", "20000001"]);
        let r = s.handle("/blink1/id");
        assert_eq!(r.body["status"], "blink1 id");
        assert_eq!(r.body["blink1_serialnums"], json!(["20000001", "20000002"]));
        assert_eq!(r.body["blink1_id"], "20000001");
    }

    #[test]
    fn server_tickle_on() {
        let mut s = server(&["20000001"]);
        s.handle("/blink1/servertickle/on?time=5&st=on&start=2");
        let t = s
            .registry()
            .transport()
            .state("20000001")
            .unwrap()
            .tickle
            .unwrap();
        assert!(t.enabled && t.stay_lit);
        assert_eq!(t.millis, 5000);
        assert_eq!((t.start, t.end), (2, 15));
    }

    #[test]
    fn unknown_uri_is_404() {
        let mut s = server(&[]);
        let r = s.handle("/nope");
        assert_eq!(r.code, 404);
        assert_eq!(r.body["status"], "unrecognized uri");
        assert_eq!(r.body["uri"], "/nope");
    }

    #[test]
    fn help_lists_uris() {
        let mut s = server(&[]);
        let r = s.handle("/");
        assert!(r.body["supported_uris"].as_array().unwrap().len() > 10);
    }

    #[test]
    fn hot_plugged_device_reachable_by_serial() {
        let mut s = server(&["20000001"]);
        s.handle("/blink1/red");
        assert_eq!(s.registry().open_count(), 1);
        s.registry().transport().add_device("20000002");
        let r = s.handle("/blink1/blue?id=20000002");
        assert_eq!(r.body["status"], "blink1 blue");
        assert_eq!(led0(&s, "20000002"), Rgb::new(0, 0, 255));
    }

    #[test]
    fn idle_handles_are_flushed() {
        let mut s = server(&["20000001"]);
        s.idle_close = Duration::ZERO;
        s.handle("/blink1/red");
        assert_eq!(s.registry().open_count(), 1);
        assert_eq!(s.flush_idle(), 1);
        assert_eq!(s.registry().transport().open_count(), 0);
    }
}
