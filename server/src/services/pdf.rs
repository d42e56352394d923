//! Ticket and invoice PDFs.
//!
//! Layout coordinates are written in points measured from the top-left corner
//! of an A4 page and converted to PDF user space when drawn.

use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Pt, Rect, Rgb,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::borrow::Cow;
use thiserror::Error;

use super::fonts::{FontFace, FontStyle};
use super::qr::{QrMatrix, DARK_RGB, QUIET_ZONE_MODULES};

const PAGE_WIDTH_PT: f32 = 595.28;
const PAGE_HEIGHT_PT: f32 = 841.89;

const SAPPHIRE: (u8, u8, u8) = (DARK_RGB[0], DARK_RGB[1], DARK_RGB[2]);
const GOLD: (u8, u8, u8) = (0xfb, 0xbf, 0x24);
const WHITE: (u8, u8, u8) = (0xff, 0xff, 0xff);
const BLACK: (u8, u8, u8) = (0x00, 0x00, 0x00);
const SLATE: (u8, u8, u8) = (0x64, 0x74, 0x8b);
const SLATE_DARK: (u8, u8, u8) = (0x47, 0x55, 0x69);
const RULE: (u8, u8, u8) = (0xe2, 0xe8, 0xf0);
const PANEL: (u8, u8, u8) = (0xf8, 0xfa, 0xfc);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("pdf error: {0}")]
    Pdf(String),

    #[error("render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<printpdf::Error> for RenderError {
    fn from(err: printpdf::Error) -> Self {
        Self::Pdf(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct TicketDocument {
    pub booking_id: String,
    pub ticket_id: String,
    pub event_name: String,
    pub event_date: String,
    pub event_time: String,
    pub venue: String,
    pub attendee_name: String,
    pub qr: QrMatrix,
}

#[derive(Debug, Clone)]
pub struct InvoiceDocument {
    pub invoice_no: String,
    pub date: String,
    pub billed_to_name: String,
    pub billed_to_email: String,
    pub event_name: String,
    pub amount: Decimal,
    pub payment_id: String,
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn ticket(&self, doc: TicketDocument) -> Result<Vec<u8>, RenderError>;

    async fn invoice(&self, doc: InvoiceDocument) -> Result<Vec<u8>, RenderError>;
}

#[derive(Debug, Clone)]
pub struct DocumentRenderer {
    fonts: FontStyle,
}

impl DocumentRenderer {
    pub fn new(fonts: FontStyle) -> Self {
        Self { fonts }
    }
}

#[async_trait]
impl Renderer for DocumentRenderer {
    /// Renders on the blocking pool; PDF assembly is CPU bound.
    async fn ticket(&self, doc: TicketDocument) -> Result<Vec<u8>, RenderError> {
        let fonts = self.fonts.clone();
        tokio::task::spawn_blocking(move || render_ticket(&fonts, &doc)).await?
    }

    async fn invoice(&self, doc: InvoiceDocument) -> Result<Vec<u8>, RenderError> {
        let fonts = self.fonts.clone();
        tokio::task::spawn_blocking(move || render_invoice(&fonts, &doc)).await?
    }
}

pub fn render_ticket(fonts: &FontStyle, data: &TicketDocument) -> Result<Vec<u8>, RenderError> {
    let (doc, canvas) = new_page(&format!("Ticket {}", data.ticket_id));
    let regular = register_font(&doc, &fonts.regular, BuiltinFont::Helvetica)?;
    let bold = register_font(&doc, &fonts.bold, BuiltinFont::HelveticaBold)?;

    canvas.fill_rect(0.0, 0.0, PAGE_WIDTH_PT, 150.0, SAPPHIRE);
    canvas.text("NAGPUR EVENTS ELITE", 30.0, 50.0, 60.0, &bold, GOLD);
    canvas.text("Official Entry Ticket", 14.0, 50.0, 100.0, &regular, WHITE);

    canvas.text(&fit(&data.event_name, 38), 24.0, 50.0, 180.0, &bold, BLACK);
    canvas.rule(50.0, 550.0, 220.0);

    let when = format!("{} at {}", data.event_date, data.event_time);
    canvas.field("DATE & TIME", &fit(&when, 28), 50.0, 240.0, &regular, &bold);
    canvas.field("VENUE", &fit(&data.venue, 28), 300.0, 240.0, &regular, &bold);
    canvas.field("ATTENDEE", &fit(&data.attendee_name, 28), 50.0, 310.0, &regular, &bold);
    canvas.field("TICKET ID", &data.ticket_id, 300.0, 310.0, &regular, &bold);
    canvas.field("BOOKING ID", &data.booking_id, 50.0, 380.0, &regular, &bold);

    canvas.qr(&data.qr, 380.0, 380.0, 150.0);
    canvas.text("Scan for entry verification", 10.0, 395.0, 540.0, &regular, SLATE);

    canvas.fill_rect(50.0, 580.0, 500.0, 100.0, PANEL);
    canvas.text("Important Instructions:", 12.0, 70.0, 600.0, &bold, SAPPHIRE);
    let instructions = [
        "- Please carry a valid ID proof along with this ticket.",
        "- Each ticket allows one person entry only.",
        "- Do not share the QR code with anyone.",
    ];
    for (i, line) in instructions.iter().enumerate() {
        canvas.text(line, 10.0, 70.0, 620.0 + 15.0 * i as f32, &regular, SLATE_DARK);
    }

    Ok(doc.save_to_bytes()?)
}

pub fn render_invoice(fonts: &FontStyle, data: &InvoiceDocument) -> Result<Vec<u8>, RenderError> {
    let (doc, canvas) = new_page(&format!("Invoice {}", data.invoice_no));
    let regular = register_font(&doc, &fonts.regular, BuiltinFont::Helvetica)?;
    let bold = register_font(&doc, &fonts.bold, BuiltinFont::HelveticaBold)?;
    let amount = format!("INR {:.2}", data.amount);

    canvas.text("INVOICE", 24.0, 50.0, 50.0, &bold, SAPPHIRE);
    canvas.text(&format!("Invoice #: {}", data.invoice_no), 10.0, 50.0, 80.0, &regular, SLATE);
    canvas.text(&format!("Date: {}", data.date), 10.0, 50.0, 95.0, &regular, SLATE);
    canvas.rule(50.0, 550.0, 120.0);

    canvas.text("Billed To:", 12.0, 50.0, 140.0, &bold, SAPPHIRE);
    canvas.text(&fit(&data.billed_to_name, 60), 12.0, 50.0, 160.0, &regular, BLACK);
    canvas.text(&fit(&data.billed_to_email, 60), 12.0, 50.0, 175.0, &regular, BLACK);

    canvas.fill_rect(50.0, 220.0, 500.0, 30.0, SAPPHIRE);
    canvas.text("Description", 10.0, 70.0, 230.0, &bold, WHITE);
    canvas.text("Amount", 10.0, 450.0, 230.0, &bold, WHITE);

    canvas.text(&fit(&data.event_name, 55), 10.0, 70.0, 270.0, &regular, BLACK);
    canvas.text(&amount, 10.0, 450.0, 270.0, &regular, BLACK);
    canvas.rule(50.0, 550.0, 300.0);

    canvas.text("Total", 12.0, 350.0, 320.0, &bold, BLACK);
    canvas.text(&amount, 12.0, 450.0, 320.0, &bold, BLACK);

    canvas.text(&format!("Payment ID: {}", data.payment_id), 10.0, 50.0, 380.0, &regular, SLATE);
    canvas.text("Status: Paid", 10.0, 50.0, 395.0, &regular, SLATE);
    canvas.text(
        "Thank you for choosing Nagpur Events Elite!",
        10.0,
        190.0,
        500.0,
        &regular,
        SLATE,
    );

    Ok(doc.save_to_bytes()?)
}

/// Registers a face with the document. A branded face the PDF library
/// rejects is replaced by `fallback` instead of failing the document.
fn register_font(
    doc: &PdfDocumentReference,
    face: &FontFace,
    fallback: BuiltinFont,
) -> Result<Face, RenderError> {
    let builtin = match face {
        FontFace::Builtin(font) => *font,
        FontFace::Branded { name, bytes } => match doc.add_external_font(bytes.as_slice()) {
            Ok(font) => {
                return Ok(Face {
                    font,
                    unicode: true,
                })
            }
            Err(err) => {
                tracing::warn!(font = %name, error = %err, "branded font rejected, using built-in face");
                fallback
            }
        },
    };
    Ok(Face {
        font: doc.add_builtin_font(builtin)?,
        unicode: false,
    })
}

/// A registered font. Built-in faces are WinAnsi encoded and cannot draw
/// anything past Latin-1.
struct Face {
    font: IndirectFontRef,
    unicode: bool,
}

impl Face {
    fn printable<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if self.unicode || text.chars().all(|c| u32::from(c) <= 0xff) {
            return Cow::Borrowed(text);
        }
        Cow::Owned(
            text.chars()
                .map(|c| if u32::from(c) <= 0xff { c } else { '?' })
                .collect(),
        )
    }
}

fn new_page(title: &str) -> (PdfDocumentReference, Canvas) {
    let (doc, page, layer) = PdfDocument::new(
        title,
        Mm::from(Pt(PAGE_WIDTH_PT)),
        Mm::from(Pt(PAGE_HEIGHT_PT)),
        "Layer 1",
    );
    let layer = doc.get_page(page).get_layer(layer);
    (doc, Canvas { layer })
}

fn fit(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    clipped.push_str("...");
    clipped
}

fn color((r, g, b): (u8, u8, u8)) -> Color {
    Color::Rgb(Rgb::new(
        f32::from(r) / 255.0,
        f32::from(g) / 255.0,
        f32::from(b) / 255.0,
        None,
    ))
}

fn point(x: f32, y_from_top: f32) -> Point {
    Point::new(Mm::from(Pt(x)), Mm::from(Pt(PAGE_HEIGHT_PT - y_from_top)))
}

struct Canvas {
    layer: PdfLayerReference,
}

impl Canvas {
    /// `top` is the top of the text line; the baseline sits one font size below.
    fn text(&self, text: &str, size: f32, x: f32, top: f32, face: &Face, rgb: (u8, u8, u8)) {
        let printable = face.printable(text);
        if let Cow::Owned(_) = printable {
            tracing::warn!(text, "characters outside the built-in font replaced, configure a Unicode font");
        }
        self.layer.set_fill_color(color(rgb));
        self.layer.use_text(
            printable,
            size,
            Mm::from(Pt(x)),
            Mm::from(Pt(PAGE_HEIGHT_PT - top - size)),
            &face.font,
        );
    }

    fn field(
        &self,
        label: &str,
        value: &str,
        x: f32,
        top: f32,
        regular: &Face,
        bold: &Face,
    ) {
        self.text(label, 12.0, x, top, regular, SLATE);
        self.text(value, 14.0, x, top + 20.0, bold, SAPPHIRE);
    }

    fn fill_rect(&self, x: f32, top: f32, width: f32, height: f32, rgb: (u8, u8, u8)) {
        self.layer.set_fill_color(color(rgb));
        let rect = Rect::new(
            Mm::from(Pt(x)),
            Mm::from(Pt(PAGE_HEIGHT_PT - top - height)),
            Mm::from(Pt(x + width)),
            Mm::from(Pt(PAGE_HEIGHT_PT - top)),
        )
        .with_mode(PaintMode::Fill)
        .with_winding(WindingOrder::NonZero);
        self.layer.add_rect(rect);
    }

    fn rule(&self, x1: f32, x2: f32, top: f32) {
        self.layer.set_outline_color(color(RULE));
        self.layer.set_outline_thickness(1.0);
        self.layer.add_line(Line {
            points: vec![(point(x1, top), false), (point(x2, top), false)],
            is_closed: false,
        });
    }

    /// Draws the symbol as filled squares so it stays sharp at any zoom.
    fn qr(&self, matrix: &QrMatrix, x: f32, top: f32, size: f32) {
        let modules = matrix.width() + 2 * QUIET_ZONE_MODULES as usize;
        let module = size / modules as f32;
        let origin = QUIET_ZONE_MODULES as f32 * module;

        self.fill_rect(x, top, size, size, WHITE);
        for my in 0..matrix.width() {
            for mx in 0..matrix.width() {
                if matrix.is_dark(mx, my) {
                    self.fill_rect(
                        x + origin + mx as f32 * module,
                        top + origin + my as f32 * module,
                        module,
                        module,
                        SAPPHIRE,
                    );
                }
            }
        }
    }
}
