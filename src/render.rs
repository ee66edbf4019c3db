//! Renderer collaborator seam and a tabbed text renderer for terminals.

use std::io::Write;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::fetcher::FetchError;
use crate::snapshot::{Category, PriceSnapshot, ALL_CATEGORIES};

/// Receives the scheduler's view updates. Called only from the scheduler task.
pub trait Renderer: Send + 'static {
    fn show_loading(&mut self);
    fn hide_loading(&mut self);
    fn render(&mut self, snapshot: PriceSnapshot);
    /// Fetch failed; offer the user a manual retry.
    fn show_retry(&mut self, error: &FetchError);
}

const GOLD_LABELS: [(&str, &str); 4] = [
    ("24k", "طلا ۲۴ عیار"),
    ("18k_750", "طلا ۱۸ عیار ۷۵۰"),
    ("18k_740", "طلا ۱۸ عیار ۷۴۰"),
    ("used_gold", "طلای دست دوم"),
];

const COIN_LABELS: [(&str, &str); 5] = [
    ("bahar_azadi", "سکه بهار آزادی"),
    ("emami", "سکه امامی"),
    ("nim", "نیم سکه"),
    ("rob", "ربع سکه"),
    ("grami", "سکه گرمی"),
];

const CURRENCY_LABELS: [(&str, &str); 2] = [("dollar", "دلار آمریکا"), ("gbp", "پوند انگلیس")];

const PERSIAN_DIGITS: [char; 10] = ['۰', '۱', '۲', '۳', '۴', '۵', '۶', '۷', '۸', '۹'];

pub fn tab_title(category: Category) -> &'static str {
    match category {
        Category::Gold => "طلا",
        Category::Coins => "سکه",
        Category::Currency => "ارز",
    }
}

fn labels(category: Category) -> &'static [(&'static str, &'static str)] {
    match category {
        Category::Gold => &GOLD_LABELS,
        Category::Coins => &COIN_LABELS,
        Category::Currency => &CURRENCY_LABELS,
    }
}

pub fn item_label(category: Category, key: &str) -> Option<&'static str> {
    labels(category)
        .iter()
        .find(|(entry, _)| *entry == key)
        .map(|(_, label)| *label)
}

pub fn to_persian_digits(input: &str) -> String {
    input
        .chars()
        .map(|ch| match ch.to_digit(10) {
            Some(d) => PERSIAN_DIGITS[d as usize],
            None => ch,
        })
        .collect()
}

/// `6500000` becomes `۶,۵۰۰,۰۰۰`.
pub fn format_price(price: u64) -> String {
    let digits = price.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    to_persian_digits(&grouped)
}

/// Price rows for one tab: known items in display order, then unknown keys.
pub fn tab_rows(snapshot: &PriceSnapshot, category: Category) -> Vec<(String, u64)> {
    let prices = snapshot.prices(category);
    let mut rows: Vec<(String, u64)> = labels(category)
        .iter()
        .filter_map(|(key, label)| prices.get(*key).map(|price| (label.to_string(), *price)))
        .collect();

    rows.extend(
        prices
            .iter()
            .filter(|(key, _)| item_label(category, key).is_none())
            .map(|(key, price)| (key.clone(), *price)),
    );
    rows
}

struct TextView<W> {
    out: W,
    active_tab: Category,
    loading: bool,
    last: Option<PriceSnapshot>,
}

impl<W: Write> TextView<W> {
    fn draw_snapshot(&mut self) -> std::io::Result<()> {
        let Some(snapshot) = self.last.as_ref() else {
            return Ok(());
        };

        let tabs: Vec<String> = ALL_CATEGORIES
            .iter()
            .map(|category| {
                if *category == self.active_tab {
                    format!("[{}]", tab_title(*category))
                } else {
                    tab_title(*category).to_string()
                }
            })
            .collect();
        writeln!(self.out, "{}", tabs.join("  "))?;

        for (label, price) in tab_rows(snapshot, self.active_tab) {
            writeln!(self.out, "{label}: {} تومان", format_price(price))?;
        }
        writeln!(self.out, "آخرین بروزرسانی: {}", snapshot.last_update)?;
        self.out.flush()
    }

    fn draw_retry(&mut self, error: &FetchError) -> std::io::Result<()> {
        writeln!(self.out, "خطا در بارگذاری داده‌ها ({error})")?;
        writeln!(self.out, "[تلاش مجدد] type `retry`")?;
        self.out.flush()
    }
}

/// Draws the active tab of the price grid. Clones share one view, so a caller
/// can keep a clone for tab selection after handing one to the scheduler.
pub struct TextRenderer<W> {
    view: Arc<Mutex<TextView<W>>>,
}

impl<W> Clone for TextRenderer<W> {
    fn clone(&self) -> Self {
        Self {
            view: Arc::clone(&self.view),
        }
    }
}

impl<W: Write + Send + 'static> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            view: Arc::new(Mutex::new(TextView {
                out,
                active_tab: Category::Gold,
                loading: false,
                last: None,
            })),
        }
    }

    pub fn active_tab(&self) -> Category {
        self.lock().active_tab
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn select_tab(&self, category: Category) {
        let mut view = self.lock();
        if view.active_tab == category {
            return;
        }
        view.active_tab = category;
        if let Err(err) = view.draw_snapshot() {
            log_write_error(&err);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TextView<W>> {
        self.view
            .lock()
            .expect("text view lock should not be poisoned")
    }
}

impl<W: Write + Send + 'static> Renderer for TextRenderer<W> {
    fn show_loading(&mut self) {
        let mut view = self.lock();
        view.loading = true;
        if let Err(err) = writeln!(view.out, "در حال بارگذاری...") {
            log_write_error(&err);
        }
    }

    fn hide_loading(&mut self) {
        self.lock().loading = false;
    }

    fn render(&mut self, snapshot: PriceSnapshot) {
        let mut view = self.lock();
        view.last = Some(snapshot);
        if let Err(err) = view.draw_snapshot() {
            log_write_error(&err);
        }
    }

    fn show_retry(&mut self, error: &FetchError) {
        if let Err(err) = self.lock().draw_retry(error) {
            log_write_error(&err);
        }
    }
}

fn log_write_error(err: &std::io::Error) {
    warn!(
        component = "text_renderer",
        event = "render.write_error",
        error = %err
    );
}
