//! PNG heatmap rendering.
//!
//! Draws the normalized matrix as a grid of gray squares on a plotters
//! bitmap, optionally with per-cell text, tick labels and axis titles.

use crate::analysis::Pivot;
use crate::config::RenderConfig;
use crate::error::{HeatmapError, Result};
use crate::models::{Annotation, Matrix};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontFamily, FontStyle, FontTransform};
use std::path::Path;
use tracing::debug;

/// Blank border around the whole image, in pixels.
const PADDING: u32 = 4;

/// Gap between the grid and its tick labels, in pixels.
const TICK_GAP: i32 = 4;

/// Per-run rendering choices taken from the command line.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub invert: bool,
    pub annotation: Annotation,
    pub add_labels: bool,
    /// Title for the vertical axis (the X field).
    pub x_title: String,
    /// Title for the horizontal axis (the Y field).
    pub y_title: String,
}

/// Pixel geometry of a rendered heatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    /// Left edge of the grid.
    pub grid_left: u32,
    /// Top edge of the grid.
    pub grid_top: u32,
    pub cell_size: u32,
}

impl Layout {
    /// Top-left corner of cell (row, col).
    pub fn cell_origin(&self, row: usize, col: usize) -> (i32, i32) {
        (
            (self.grid_left + col as u32 * self.cell_size) as i32,
            (self.grid_top + row as u32 * self.cell_size) as i32,
        )
    }

    pub fn cell_center(&self, row: usize, col: usize) -> (i32, i32) {
        let (x, y) = self.cell_origin(row, col);
        let half = (self.cell_size / 2) as i32;
        (x + half, y + half)
    }
}

/// Values actually painted: `1 - cell` normally, `cell` when inverted.
///
/// Gray level 0.0 is black, so by default the largest value is darkest.
pub fn shading_matrix(matrix: &Matrix, invert: bool) -> Matrix {
    if invert {
        matrix.clone()
    } else {
        matrix.inverted()
    }
}

/// 8-bit gray level for a shade in [0, 1].
pub fn gray_level(shade: f64) -> u8 {
    (shade.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Text to draw in each cell as (row, col, text).
///
/// Fractions are taken from the normalized matrix, never from the shading,
/// so they read the same with or without `--invert`. Raw annotations skip
/// cells no row supplied.
pub fn cell_labels(
    pivot: &Pivot,
    matrix: &Matrix,
    annotation: Annotation,
) -> Vec<(usize, usize, String)> {
    let (rows, cols) = matrix.dims();
    let mut labels = Vec::new();

    for i in 0..rows {
        for j in 0..cols {
            let text = match annotation {
                Annotation::None => None,
                Annotation::Fractions => matrix.get(i, j).map(|v| format!("{:.1}", v)),
                Annotation::Raw => pivot.raw_at(i, j).map(|v| format!("{}", v.trunc() as i64)),
            };
            if let Some(text) = text {
                labels.push((i, j, text));
            }
        }
    }

    labels
}

/// Parse a `#rrggbb` color.
pub fn parse_hex_color(s: &str) -> Result<RGBColor> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    let invalid = || HeatmapError::Usage(format!("invalid color '{}', expected #rrggbb", s));

    if hex.len() != 6 || !hex.is_ascii() {
        return Err(invalid());
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|_| invalid())
    };

    Ok(RGBColor(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Draws heatmaps according to the render configuration.
pub struct HeatmapRenderer {
    config: RenderConfig,
    annotation_color: RGBColor,
}

impl HeatmapRenderer {
    pub fn new(config: RenderConfig) -> Result<Self> {
        if config.cell_size == 0 {
            return Err(HeatmapError::Usage(
                "render.cell_size must be at least 1".to_string(),
            ));
        }
        let annotation_color = parse_hex_color(&config.annotation_color)?;
        Ok(Self {
            config,
            annotation_color,
        })
    }

    /// Compute image geometry for a `rows` x `cols` grid.
    ///
    /// Neither dimension exceeds `max_image_size`; the cell size shrinks to
    /// fit, and a grid that cannot fit at one pixel per cell is an error.
    pub fn layout(&self, rows: usize, cols: usize, options: &RenderOptions) -> Result<Layout> {
        let title_band = if self.config.axis_titles {
            u64::from(self.config.font_size) * 2
        } else {
            0
        };
        let label_band = if options.add_labels {
            u64::from(self.config.label_margin)
        } else {
            0
        };

        let padding = u64::from(PADDING);
        let grid_left = padding + title_band + label_band;
        let extra_w = grid_left + padding;
        let extra_h = padding + label_band + title_band + padding;
        let max = u64::from(self.config.max_image_size);

        let too_large = || {
            HeatmapError::Render(format!(
                "{}x{} grid does not fit in a {}px image (render.max_image_size)",
                rows, cols, max
            ))
        };
        let avail_w = max.checked_sub(extra_w).ok_or_else(too_large)?;
        let avail_h = max.checked_sub(extra_h).ok_or_else(too_large)?;
        let fit = (avail_w / cols.max(1) as u64).min(avail_h / rows.max(1) as u64);

        let cs = u64::from(self.config.cell_size).min(fit);
        if cs == 0 {
            return Err(too_large());
        }
        if cs < u64::from(self.config.cell_size) {
            debug!(
                "Shrinking cells from {}px to {}px to fit {}px",
                self.config.cell_size, cs, max
            );
        }

        // every term is bounded by max_image_size, itself a u32
        Ok(Layout {
            width: (extra_w + cols as u64 * cs) as u32,
            height: (extra_h + rows as u64 * cs) as u32,
            grid_left: grid_left as u32,
            grid_top: PADDING,
            cell_size: cs as u32,
        })
    }

    /// Render to a PNG file.
    ///
    /// The image is drawn into memory first; the file is only created once
    /// drawing has succeeded.
    pub fn render_to_file(
        &self,
        pivot: &Pivot,
        matrix: &Matrix,
        options: &RenderOptions,
        path: &Path,
    ) -> Result<Layout> {
        let (rows, cols) = matrix.dims();
        let layout = self.layout(rows, cols, options)?;
        debug!(
            "Rendering {}x{} grid into {}x{} image",
            rows, cols, layout.width, layout.height
        );

        let mut buffer = vec![0u8; layout.width as usize * layout.height as usize * 3];
        self.render_to_buffer(pivot, matrix, options, &layout, &mut buffer)?;

        let mut backend = BitMapBackend::new(path, (layout.width, layout.height));
        backend
            .blit_bitmap((0, 0), (layout.width, layout.height), &buffer)
            .map_err(render_error)?;
        backend.present().map_err(render_error)?;

        Ok(layout)
    }

    /// Render into a caller-supplied RGB buffer of `layout.width * layout.height * 3` bytes.
    pub fn render_to_buffer(
        &self,
        pivot: &Pivot,
        matrix: &Matrix,
        options: &RenderOptions,
        layout: &Layout,
        buffer: &mut [u8],
    ) -> Result<()> {
        let root =
            BitMapBackend::with_buffer(buffer, (layout.width, layout.height)).into_drawing_area();
        self.draw(&root, layout, pivot, matrix, options)?;
        root.present().map_err(render_error)?;
        Ok(())
    }

    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        layout: &Layout,
        pivot: &Pivot,
        matrix: &Matrix,
        options: &RenderOptions,
    ) -> Result<()> {
        root.fill(&WHITE).map_err(render_error)?;

        let shading = shading_matrix(matrix, options.invert);
        let cs = layout.cell_size as i32;

        for (i, row) in shading.rows().iter().enumerate() {
            for (j, shade) in row.iter().enumerate() {
                let g = gray_level(*shade);
                let (x, y) = layout.cell_origin(i, j);
                root.draw(&Rectangle::new(
                    [(x, y), (x + cs, y + cs)],
                    RGBColor(g, g, g).filled(),
                ))
                .map_err(render_error)?;
            }
        }

        let labels = cell_labels(pivot, matrix, options.annotation);
        if !labels.is_empty() {
            let style = TextStyle::from(self.font(FontTransform::None))
                .color(&self.annotation_color)
                .pos(Pos::new(HPos::Center, VPos::Center));
            for (i, j, text) in &labels {
                root.draw(&Text::new(text.as_str(), layout.cell_center(*i, *j), style.clone()))
                    .map_err(render_error)?;
            }
        }

        if options.add_labels {
            self.draw_tick_labels(root, layout, pivot)?;
        }

        if self.config.axis_titles {
            self.draw_axis_titles(root, layout, matrix, options)?;
        }

        Ok(())
    }

    fn draw_tick_labels<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        layout: &Layout,
        pivot: &Pivot,
    ) -> Result<()> {
        let row_style = TextStyle::from(self.font(FontTransform::None))
            .color(&BLACK)
            .pos(Pos::new(HPos::Right, VPos::Center));
        for (i, label) in pivot.x_labels().iter().enumerate() {
            let (_, y) = layout.cell_center(i, 0);
            let x = layout.grid_left as i32 - TICK_GAP;
            root.draw(&Text::new(label.as_str(), (x, y), row_style.clone()))
                .map_err(render_error)?;
        }

        // column labels run downward from the bottom edge of the grid
        let grid_bottom = layout.cell_origin(pivot.x_labels().len(), 0).1;
        let col_style = TextStyle::from(self.font(FontTransform::Rotate90))
            .color(&BLACK)
            .pos(Pos::new(HPos::Left, VPos::Center));
        for (j, label) in pivot.y_labels().iter().enumerate() {
            let (x, _) = layout.cell_center(0, j);
            root.draw(&Text::new(
                label.as_str(),
                (x, grid_bottom + TICK_GAP),
                col_style.clone(),
            ))
            .map_err(render_error)?;
        }

        Ok(())
    }

    fn draw_axis_titles<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        layout: &Layout,
        matrix: &Matrix,
        options: &RenderOptions,
    ) -> Result<()> {
        let (rows, cols) = matrix.dims();
        let grid_w = cols as i32 * layout.cell_size as i32;
        let grid_h = rows as i32 * layout.cell_size as i32;
        let font = self.config.font_size as i32;

        let bottom_style = TextStyle::from(self.font(FontTransform::None))
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        let bottom = (
            layout.grid_left as i32 + grid_w / 2,
            layout.height as i32 - PADDING as i32 - font,
        );
        root.draw(&Text::new(options.y_title.as_str(), bottom, bottom_style))
            .map_err(render_error)?;

        let side_style = TextStyle::from(self.font(FontTransform::Rotate270))
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        let side = (PADDING as i32 + font, layout.grid_top as i32 + grid_h / 2);
        root.draw(&Text::new(options.x_title.as_str(), side, side_style))
            .map_err(render_error)?;

        Ok(())
    }

    fn font(&self, transform: FontTransform) -> FontDesc<'_> {
        FontDesc::new(
            FontFamily::from(self.config.font_family.as_str()),
            self.config.font_size as f64,
            FontStyle::Normal,
        )
        .transform(transform)
    }
}

fn render_error<E: std::error::Error>(e: E) -> HeatmapError {
    HeatmapError::Render(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::pivot;
    use crate::models::{PivotFields, Record};

    fn record(x: &str, y: &str, v: &str) -> Record {
        [("X", x), ("Y", y), ("count", v)]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sample_pivot() -> Pivot {
        let rows = vec![
            record("a", "p", "10"),
            record("a", "q", "20"),
            record("b", "p", "5.9"),
        ];
        pivot(&rows, &PivotFields::new("X", "Y", "count")).unwrap()
    }

    fn plain_options(invert: bool) -> RenderOptions {
        RenderOptions {
            invert,
            annotation: Annotation::None,
            add_labels: false,
            x_title: "X".to_string(),
            y_title: "Y".to_string(),
        }
    }

    fn textless_renderer() -> HeatmapRenderer {
        HeatmapRenderer::new(RenderConfig {
            axis_titles: false,
            ..RenderConfig::default()
        })
        .unwrap()
    }

    fn pixel(buffer: &[u8], layout: &Layout, (x, y): (i32, i32)) -> (u8, u8, u8) {
        let idx = (y as usize * layout.width as usize + x as usize) * 3;
        (buffer[idx], buffer[idx + 1], buffer[idx + 2])
    }

    #[test]
    fn test_gray_level() {
        assert_eq!(gray_level(0.0), 0);
        assert_eq!(gray_level(1.0), 255);
        assert_eq!(gray_level(1.5), 255);
        assert_eq!(gray_level(-0.2), 0);
    }

    #[test]
    fn test_shading_is_complementary() {
        let matrix = sample_pivot().normalized_matrix();
        let normal = shading_matrix(&matrix, false);
        let inverted = shading_matrix(&matrix, true);

        assert_eq!(inverted, matrix);
        for (a, b) in normal.rows().iter().flatten().zip(inverted.rows().iter().flatten()) {
            assert!((a + b - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_fraction_labels() {
        let p = sample_pivot();
        let labels = cell_labels(&p, &p.normalized_matrix(), Annotation::Fractions);

        let texts: Vec<&str> = labels.iter().map(|(_, _, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["0.5", "1.0", "0.3", "0.0"]);
    }

    #[test]
    fn test_raw_labels_skip_absent_cells() {
        let p = sample_pivot();
        let labels = cell_labels(&p, &p.normalized_matrix(), Annotation::Raw);

        assert_eq!(
            labels,
            vec![
                (0, 0, "10".to_string()),
                (0, 1, "20".to_string()),
                (1, 0, "5".to_string()),
            ]
        );
    }

    #[test]
    fn test_no_labels() {
        let p = sample_pivot();
        assert!(cell_labels(&p, &p.normalized_matrix(), Annotation::None).is_empty());
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#ff0000").unwrap(), RGBColor(255, 0, 0));
        assert_eq!(parse_hex_color("0a0B0c").unwrap(), RGBColor(10, 11, 12));
        assert!(parse_hex_color("#ff00").is_err());
        assert!(parse_hex_color("#gg0000").is_err());
    }

    #[test]
    fn test_rejects_zero_cell_size() {
        let config = RenderConfig {
            cell_size: 0,
            ..RenderConfig::default()
        };
        assert!(HeatmapRenderer::new(config).is_err());
    }

    #[test]
    fn test_layout_grows_with_labels() {
        let renderer = textless_renderer();
        let mut options = plain_options(false);
        let plain = renderer.layout(2, 3, &options).unwrap();
        assert_eq!(plain.width, 2 * PADDING + 3 * 40);
        assert_eq!(plain.height, 2 * PADDING + 2 * 40);

        options.add_labels = true;
        let labeled = renderer.layout(2, 3, &options).unwrap();
        assert_eq!(labeled.width, plain.width + 120);
        assert_eq!(labeled.height, plain.height + 120);
    }

    #[test]
    fn test_layout_shrinks_cells_to_max_image_size() {
        let renderer = HeatmapRenderer::new(RenderConfig::default()).unwrap();
        let layout = renderer.layout(1000, 1000, &plain_options(false)).unwrap();

        assert!(layout.width <= 4096 && layout.height <= 4096);
        assert_eq!(layout.cell_size, 4);
    }

    #[test]
    fn test_layout_huge_cell_size_is_capped() {
        let renderer = HeatmapRenderer::new(RenderConfig {
            cell_size: 3_000_000_000,
            axis_titles: false,
            ..RenderConfig::default()
        })
        .unwrap();
        let layout = renderer.layout(2, 2, &plain_options(false)).unwrap();

        assert_eq!(layout.width, 4096);
        assert_eq!(layout.cell_size, (4096 - 2 * PADDING) / 2);
    }

    #[test]
    fn test_layout_too_many_cells() {
        let renderer = HeatmapRenderer::new(RenderConfig {
            axis_titles: false,
            max_image_size: 64,
            ..RenderConfig::default()
        })
        .unwrap();

        let err = renderer.layout(100, 100, &plain_options(false)).unwrap_err();
        assert!(matches!(err, HeatmapError::Render(_)));

        let mut options = plain_options(false);
        options.add_labels = true;
        assert!(renderer.layout(1, 1, &options).is_err());
    }

    #[test]
    fn test_render_to_buffer_pixels() {
        let renderer = textless_renderer();
        let p = sample_pivot();
        let matrix = p.normalized_matrix();
        let options = plain_options(false);
        let layout = renderer.layout(2, 2, &options).unwrap();

        let mut buffer = vec![0u8; (layout.width * layout.height * 3) as usize];
        renderer
            .render_to_buffer(&p, &matrix, &options, &layout, &mut buffer)
            .unwrap();

        // (a, q) is the maximum: black when not inverted
        assert_eq!(pixel(&buffer, &layout, layout.cell_center(0, 1)), (0, 0, 0));
        // (b, q) is absent: white
        assert_eq!(
            pixel(&buffer, &layout, layout.cell_center(1, 1)),
            (255, 255, 255)
        );
        // (a, p) is 0.5
        let (g, _, _) = pixel(&buffer, &layout, layout.cell_center(0, 0));
        assert_eq!(g, gray_level(0.5));
    }

    #[test]
    fn test_render_inverted_pixels() {
        let renderer = textless_renderer();
        let p = sample_pivot();
        let matrix = p.normalized_matrix();
        let options = plain_options(true);
        let layout = renderer.layout(2, 2, &options).unwrap();

        let mut buffer = vec![0u8; (layout.width * layout.height * 3) as usize];
        renderer
            .render_to_buffer(&p, &matrix, &options, &layout, &mut buffer)
            .unwrap();

        assert_eq!(
            pixel(&buffer, &layout, layout.cell_center(0, 1)),
            (255, 255, 255)
        );
        assert_eq!(pixel(&buffer, &layout, layout.cell_center(1, 1)), (0, 0, 0));
    }

    #[test]
    fn test_render_with_text() {
        let renderer = HeatmapRenderer::new(RenderConfig::default()).unwrap();
        let p = sample_pivot();
        let matrix = p.normalized_matrix();
        let options = RenderOptions {
            annotation: Annotation::Fractions,
            add_labels: true,
            ..plain_options(false)
        };
        let layout = renderer.layout(2, 2, &options).unwrap();

        let mut buffer = vec![0u8; (layout.width * layout.height * 3) as usize];
        match renderer.render_to_buffer(&p, &matrix, &options, &layout, &mut buffer) {
            Ok(()) => {
                // the "0.5" annotation leaves red-tinted pixels in the gray cell
                let (x0, y0) = layout.cell_origin(0, 0);
                let cs = layout.cell_size as i32;
                let tinted = (y0..y0 + cs)
                    .flat_map(|y| (x0..x0 + cs).map(move |x| (x, y)))
                    .map(|at| pixel(&buffer, &layout, at))
                    .any(|(r, g, b)| r > g && g == b);
                assert!(tinted);
            }
            // hosts without any usable font
            Err(err) => assert!(matches!(err, HeatmapError::Render(_))),
        }
    }

    #[test]
    fn test_render_to_file_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let p = sample_pivot();

        let layout = textless_renderer()
            .render_to_file(&p, &p.normalized_matrix(), &plain_options(false), &path)
            .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        assert!(layout.width > 0 && layout.height > 0);
    }
}
