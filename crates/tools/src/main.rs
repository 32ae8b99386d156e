use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use formats::{CoordinateSpace, FeatureCollection};
use serde::Serialize;
use serde_json::Value;
use styling::{
    SourceSelector, SpriteAtlas, Style, StyleDocument, StyleFeature, StyleFunction,
    StyleFunctionOptions, default_resolutions,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), String> {
    let mut args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(usage());
    }

    let cmd = args[1].clone();
    args.drain(0..2);

    match cmd.as_str() {
        "eval" => cmd_eval(args),
        "layers" => cmd_layers(args),
        _ => Err(usage()),
    }
}

/// Options shared by every subcommand.
#[derive(Debug, Default)]
struct CommonArgs {
    selector: Option<SourceSelector>,
    resolution: Option<f64>,
    sprite: Option<PathBuf>,
    fonts: Option<Vec<String>>,
    lon_lat: bool,
    pretty: bool,
    only_layer: Option<String>,
}

impl CommonArgs {
    fn parse(args: &[String], positional: &mut Vec<String>) -> Result<Self, String> {
        let mut out = CommonArgs::default();
        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            let mut value = |name: &str| take_value(args, &mut i, name);
            match flag {
                "--source" => out.selector = Some(SourceSelector::Source(value("--source")?)),
                "--layers" => {
                    let ids = split_list(&value("--layers")?);
                    out.selector = Some(SourceSelector::Layers(ids));
                }
                "--resolution" => {
                    let raw = value("--resolution")?;
                    let resolution: f64 = raw
                        .parse()
                        .map_err(|e| format!("invalid --resolution {raw}: {e}"))?;
                    out.resolution = Some(resolution);
                }
                "--zoom" => {
                    let raw = value("--zoom")?;
                    let zoom: f64 = raw.parse().map_err(|e| format!("invalid --zoom {raw}: {e}"))?;
                    out.resolution = Some(resolution_for_zoom(zoom));
                }
                "--sprite" => out.sprite = Some(PathBuf::from(value("--sprite")?)),
                "--fonts" => out.fonts = Some(split_list(&value("--fonts")?)),
                "--only-layer" => out.only_layer = Some(value("--only-layer")?),
                "--lonlat" => out.lon_lat = true,
                "--pretty" => out.pretty = true,
                s if s.starts_with('-') => {
                    return Err(format!("unknown arg: {s}\n\n{}", usage()));
                }
                other => positional.push(other.to_string()),
            }
            i += 1;
        }

        if out.selector.is_none()
            && let Ok(source) = env::var("MAPSTYLE_SOURCE")
        {
            out.selector = Some(SourceSelector::Source(source));
        }
        Ok(out)
    }

    fn options(&self) -> Result<StyleFunctionOptions, String> {
        let selector = self
            .selector
            .clone()
            .ok_or_else(|| format!("--source or --layers is required\n\n{}", usage()))?;
        let mut options = StyleFunctionOptions::new(selector);
        options.available_fonts = self.fonts.clone();
        if let Some(base) = &self.sprite {
            options.sprite = Some(load_sprite(base)?);
        }
        Ok(options)
    }
}

fn take_value(args: &[String], i: &mut usize, name: &str) -> Result<String, String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| format!("{name} requires a value"))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn resolution_for_zoom(zoom: f64) -> f64 {
    default_resolutions()[0] / 2f64.powf(zoom)
}

fn read_style(path: &Path) -> Result<StyleDocument, String> {
    let payload = fs::read_to_string(path).map_err(|e| format!("read {path:?}: {e}"))?;
    StyleDocument::from_json_str(&payload).map_err(|e| format!("style {path:?}: {e}"))
}

/// Load `<base>.json` and, when present, `<base>.png`.
fn load_sprite(base: &Path) -> Result<SpriteAtlas, String> {
    let json_path = base.with_extension("json");
    let metadata =
        fs::read_to_string(&json_path).map_err(|e| format!("read {json_path:?}: {e}"))?;
    let mut atlas =
        SpriteAtlas::from_json_str(&metadata).map_err(|e| format!("sprite {json_path:?}: {e}"))?;

    let png_path = base.with_extension("png");
    match fs::read(&png_path) {
        Ok(bytes) => atlas
            .set_png(&bytes)
            .map_err(|e| format!("sprite {png_path:?}: {e}"))?,
        Err(e) => tracing::warn!(path = ?png_path, error = %e, "sprite image unavailable"),
    }
    Ok(atlas)
}

#[derive(Serialize)]
struct FeatureStyles<'a> {
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a Value>,
    layers: &'a [String],
    styles: &'a [Style],
}

fn cmd_eval(args: Vec<String>) -> Result<(), String> {
    // mapstyle eval <style.json> <features.geojson> (--source NAME | --layers a,b) [...]
    let mut positional = Vec::new();
    let common = CommonArgs::parse(&args, &mut positional)?;
    let [style_path, features_path] = positional.as_slice() else {
        return Err(usage());
    };

    let document = read_style(Path::new(style_path))?;
    let mut function =
        StyleFunction::new(document, common.options()?).map_err(|e| format!("style: {e}"))?;

    let space = if common.lon_lat {
        CoordinateSpace::LonLat
    } else {
        CoordinateSpace::Map
    };
    let payload =
        fs::read_to_string(features_path).map_err(|e| format!("read {features_path:?}: {e}"))?;
    let collection = FeatureCollection::from_geojson_str(&payload, space)
        .map_err(|e| format!("parse geojson: {e}"))?;

    let resolution = common
        .resolution
        .unwrap_or_else(|| function.resolutions().first().copied().unwrap_or(1.0));
    tracing::debug!(
        source = function.source_name(),
        resolution,
        zoom = function.zoom_for_resolution(resolution),
        features = collection.features.len(),
        "evaluating"
    );

    let mut out = Vec::new();
    for (index, feature) in collection.features.iter().enumerate() {
        let Some(styles) =
            function.evaluate_layer(feature, resolution, common.only_layer.as_deref())
        else {
            continue;
        };
        let styles = styles.to_vec();
        let record = FeatureStyles {
            index,
            id: feature.id(),
            layers: function.last_layers(),
            styles: &styles,
        };
        out.push(serde_json::to_value(&record).map_err(|e| format!("json: {e}"))?);
    }

    let v = Value::Array(out);
    let text = if common.pretty {
        serde_json::to_string_pretty(&v)
    } else {
        serde_json::to_string(&v)
    }
    .map_err(|e| format!("json: {e}"))?;
    println!("{text}");
    Ok(())
}

fn cmd_layers(args: Vec<String>) -> Result<(), String> {
    // mapstyle layers <style.json> (--source NAME | --layers a,b)
    let mut positional = Vec::new();
    let common = CommonArgs::parse(&args, &mut positional)?;
    let [style_path] = positional.as_slice() else {
        return Err(usage());
    };

    let document = read_style(Path::new(style_path))?;
    let function =
        StyleFunction::new(document, common.options()?).map_err(|e| format!("style: {e}"))?;
    println!("source: {}", function.source_name());
    for id in function.layer_ids() {
        println!("  {id}");
    }
    Ok(())
}

fn usage() -> String {
    let exe = env::args().next().unwrap_or_else(|| "mapstyle".to_string());
    format!(
        "Usage:\n  {exe} eval <style.json> <features.geojson> (--source NAME | --layers ID,ID) [--resolution R | --zoom Z] [--sprite BASE] [--fonts NAME,NAME] [--only-layer ID] [--lonlat] [--pretty]\n  {exe} layers <style.json> (--source NAME | --layers ID,ID)\n\nNotes:\n- MAPSTYLE_SOURCE is used when neither --source nor --layers is given.\n- --sprite BASE reads BASE.json and BASE.png.\n- Coordinates are map units unless --lonlat is given.\n- Set RUST_LOG=debug for diagnostics on stderr.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_common_args() {
        let mut positional = Vec::new();
        let common = CommonArgs::parse(
            &args(&["style.json", "--layers", "a, b", "--zoom", "1", "--pretty", "data.geojson"]),
            &mut positional,
        )
        .expect("args");
        assert_eq!(positional, vec!["style.json", "data.geojson"]);
        assert_eq!(
            common.selector,
            Some(SourceSelector::Layers(vec!["a".into(), "b".into()]))
        );
        assert_eq!(common.resolution, Some(default_resolutions()[1]));
        assert!(common.pretty);
    }

    #[test]
    fn rejects_missing_values_and_unknown_flags() {
        let mut positional = Vec::new();
        assert!(CommonArgs::parse(&args(&["--source"]), &mut positional).is_err());
        assert!(CommonArgs::parse(&args(&["--bogus"]), &mut positional).is_err());
        assert!(CommonArgs::parse(&args(&["--zoom", "x"]), &mut positional).is_err());
    }
}
