use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::Hasher;
use std::ops::Range;
use std::rc::Rc;

use emberchat_backend::{MessageId, MessageRecord, UserId};
use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{ActiveTheme, Icon, IconName, h_flex, label::Label, v_flex, v_virtual_list};

use crate::chat::scroll::FollowScroll;

const DEFAULT_CONTENT_WIDTH: Pixels = px(640.);
const LIST_HORIZONTAL_PADDING: Pixels = px(16.);
const CONTENT_WIDTH_CHANGE_EPSILON: f32 = 1.0;
const BUBBLE_MAX_WIDTH: Pixels = px(420.);
const BUBBLE_PADDING_X: Pixels = px(12.);
const BUBBLE_PADDING_Y: Pixels = px(8.);
const AVATAR_SIZE: Pixels = px(28.);
const AVATAR_GAP: Pixels = px(8.);
const ESTIMATED_TEXT_LINE_HEIGHT: Pixels = px(18.);
const ESTIMATED_CHAR_WIDTH: f32 = 7.0;

/// Visual treatment of one message row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleVariant {
    /// Authored by the current session; right-aligned, accent colors.
    Sent,
    /// Authored by anyone else; left-aligned, muted colors.
    Received,
}

/// Pure authorship mapping: a record renders as `Sent` iff its author uid
/// equals the viewer's uid.
pub fn bubble_variant(record: &MessageRecord, viewer_uid: &UserId) -> BubbleVariant {
    if record.author_uid == *viewer_uid {
        BubbleVariant::Sent
    } else {
        BubbleVariant::Received
    }
}

/// Where a row's avatar comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarSource<'a> {
    Remote(&'a str),
    Placeholder,
}

/// Resolves the avatar for a record; absent or blank photo URLs fall back to
/// the placeholder.
pub fn avatar_source(photo_url: Option<&str>) -> AvatarSource<'_> {
    match photo_url {
        Some(url) if !url.trim().is_empty() => AvatarSource::Remote(url),
        _ => AvatarSource::Placeholder,
    }
}

struct SizeCacheEntry {
    layout_hash: u64,
    height: Pixels,
    measured: bool,
}

/// Virtualized message feed with scroll-follow behavior.
pub struct MessageList {
    viewer_uid: Option<UserId>,
    messages: Vec<MessageRecord>,
    item_sizes: Rc<Vec<Size<Pixels>>>,
    scroll: FollowScroll,
    size_cache: HashMap<MessageId, SizeCacheEntry>,
    content_width: Option<Pixels>,
}

impl MessageList {
    pub fn new(_cx: &mut Context<Self>) -> Self {
        Self {
            viewer_uid: None,
            messages: Vec::new(),
            item_sizes: Rc::new(Vec::new()),
            scroll: FollowScroll::new(),
            size_cache: HashMap::new(),
            content_width: None,
        }
    }

    pub fn messages(&self) -> &[MessageRecord] {
        &self.messages
    }

    /// Sets the uid used for the sent/received split. Invalidates row caches
    /// because every variant can flip.
    pub fn set_viewer(&mut self, viewer_uid: Option<UserId>, cx: &mut Context<Self>) {
        if self.viewer_uid == viewer_uid {
            return;
        }

        self.viewer_uid = viewer_uid;
        self.size_cache.clear();
        self.rebuild_item_sizes();
        cx.notify();
    }

    pub fn set_messages(&mut self, messages: Vec<MessageRecord>, cx: &mut Context<Self>) {
        let grew = messages.len() > self.messages.len();

        self.messages = messages;
        self.rebuild_item_sizes();

        if grew {
            self.scroll.follow_if_at_tail();
        }

        cx.notify();
    }

    pub fn request_scroll_to_bottom(&mut self, cx: &mut Context<Self>) {
        self.scroll.jump_to_latest();
        cx.notify();
    }

    pub fn reset_scroll_tracking(&mut self, cx: &mut Context<Self>) {
        self.scroll.reset();
        cx.notify();
    }

    fn variant_for(&self, record: &MessageRecord) -> BubbleVariant {
        self.viewer_uid
            .as_ref()
            .map(|viewer_uid| bubble_variant(record, viewer_uid))
            .unwrap_or(BubbleVariant::Received)
    }

    fn update_content_width(&mut self, cx: &mut Context<Self>) {
        let list_width = self.scroll.bounds_width();
        if list_width <= Pixels::ZERO {
            return;
        }

        let next_content_width = max_pixels(px(1.), list_width - LIST_HORIZONTAL_PADDING * 2);
        let width_changed = self.content_width.is_none_or(|current| {
            (f32::from(current) - f32::from(next_content_width)).abs()
                > CONTENT_WIDTH_CHANGE_EPSILON
        });

        if width_changed {
            self.content_width = Some(next_content_width);

            // Cached heights are only valid for the width they were measured
            // at.
            for entry in self.size_cache.values_mut() {
                entry.measured = false;
            }

            self.rebuild_item_sizes();
            cx.notify();
        }
    }

    fn rebuild_item_sizes(&mut self) {
        let content_width = self.content_width.unwrap_or(DEFAULT_CONTENT_WIDTH);
        let mut active_ids = HashSet::with_capacity(self.messages.len());
        let mut sizes = Vec::with_capacity(self.messages.len());

        for record in &self.messages {
            let variant = self
                .viewer_uid
                .as_ref()
                .map(|viewer_uid| bubble_variant(record, viewer_uid))
                .unwrap_or(BubbleVariant::Received);
            let next_hash = layout_hash(record, variant);
            let estimated_height = estimate_row_height(record, content_width);

            let entry = self
                .size_cache
                .entry(record.id.clone())
                .or_insert(SizeCacheEntry {
                    layout_hash: next_hash,
                    height: estimated_height,
                    measured: false,
                });

            // Rows are cached by message id; only semantic changes invalidate.
            if entry.layout_hash != next_hash {
                entry.layout_hash = next_hash;
                entry.height = estimated_height;
                entry.measured = false;
            } else if !entry.measured {
                entry.height = estimated_height;
            }

            sizes.push(size(px(0.), entry.height));
            active_ids.insert(record.id.clone());
        }

        self.size_cache.retain(|id, _| active_ids.contains(id));
        self.item_sizes = Rc::new(sizes);
    }

    fn measure_visible_items(
        &mut self,
        visible_range: Range<usize>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        if self.messages.is_empty() {
            return;
        }

        let content_width = self.content_width.unwrap_or(DEFAULT_CONTENT_WIDTH);
        let available_space = size(
            AvailableSpace::Definite(content_width),
            AvailableSpace::MinContent,
        );
        let mut updated = false;

        for index in visible_range {
            let Some(record) = self.messages.get(index).cloned() else {
                continue;
            };

            let variant = self.variant_for(&record);
            let next_hash = layout_hash(&record, variant);
            let estimated_height = estimate_row_height(&record, content_width);

            {
                let entry = self
                    .size_cache
                    .entry(record.id.clone())
                    .or_insert(SizeCacheEntry {
                        layout_hash: next_hash,
                        height: estimated_height,
                        measured: false,
                    });

                if entry.layout_hash != next_hash {
                    entry.layout_hash = next_hash;
                    entry.height = estimated_height;
                    entry.measured = false;
                }
            }

            let mut row = self.render_message_row(&record, cx);
            let measured_height = row.layout_as_root(available_space, window, cx).height;
            let Some(entry) = self.size_cache.get_mut(&record.id) else {
                continue;
            };
            let height_changed = !entry.measured || pixels_changed(entry.height, measured_height);
            if height_changed {
                entry.height = measured_height;
                updated = true;
            }
            entry.measured = true;
        }

        if updated {
            self.rebuild_item_sizes();
            cx.notify();
        }
    }

    fn render_avatar(&self, record: &MessageRecord, cx: &Context<Self>) -> AnyElement {
        let theme = cx.theme();

        match avatar_source(record.author_photo_url.as_deref()) {
            AvatarSource::Remote(url) => img(SharedUri::from(url.to_string()))
                .size(AVATAR_SIZE)
                .rounded_full()
                .into_any_element(),
            AvatarSource::Placeholder => div()
                .size(AVATAR_SIZE)
                .rounded_full()
                .border_1()
                .border_color(theme.border)
                .bg(theme.muted)
                .flex()
                .items_center()
                .justify_center()
                .child(
                    Icon::new(IconName::CircleUser)
                        .size(px(16.))
                        .text_color(theme.muted_foreground),
                )
                .into_any_element(),
        }
    }

    fn render_message_row(&self, record: &MessageRecord, cx: &mut Context<Self>) -> AnyElement {
        let variant = self.variant_for(record);
        let theme = cx.theme();

        let bubble = div()
            .max_w(BUBBLE_MAX_WIDTH)
            .px(BUBBLE_PADDING_X)
            .py(BUBBLE_PADDING_Y)
            .rounded_lg()
            .map(|bubble| match variant {
                BubbleVariant::Sent => bubble
                    .bg(theme.accent)
                    .text_color(theme.accent_foreground),
                BubbleVariant::Received => bubble.bg(theme.muted).text_color(theme.foreground),
            })
            .child(Label::new(record.text.clone()).text_sm());

        let avatar = self.render_avatar(record, cx);

        let row = h_flex().w_full().gap_2().items_end();
        match variant {
            BubbleVariant::Sent => row.justify_end().child(bubble).child(avatar),
            BubbleVariant::Received => row.justify_start().child(avatar).child(bubble),
        }
        .into_any_element()
    }
}

impl Render for MessageList {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        self.update_content_width(cx);
        self.scroll.observe_frame();
        self.scroll.apply_pending_jump();

        if self.messages.is_empty() {
            let theme = cx.theme();
            return v_flex()
                .size_full()
                .items_center()
                .justify_center()
                .child(
                    Label::new("No messages yet. Say something nice.")
                        .text_sm()
                        .text_color(theme.muted_foreground),
                )
                .into_any_element();
        }

        v_flex()
            .size_full()
            .min_h_0()
            .child(
                v_virtual_list(
                    cx.entity().clone(),
                    "message-feed",
                    self.item_sizes.clone(),
                    |this, visible_range, window, cx| {
                        // Only visible rows are measured, so long feeds keep
                        // O(visible) layout work.
                        this.update_content_width(cx);
                        this.measure_visible_items(visible_range.clone(), window, cx);
                        visible_range
                            .filter_map(|index| {
                                this.messages
                                    .get(index)
                                    .cloned()
                                    .map(|record| this.render_message_row(&record, cx))
                            })
                            .collect::<Vec<_>>()
                    },
                )
                .size_full()
                .px_4()
                .py_3()
                .gap_3()
                .track_scroll(self.scroll.handle()),
            )
            .into_any_element()
    }
}

fn layout_hash(record: &MessageRecord, variant: BubbleVariant) -> u64 {
    let mut hasher = DefaultHasher::new();

    hasher.write(record.id.as_str().as_bytes());
    hasher.write(record.text.as_bytes());
    hasher.write_u8(match variant {
        BubbleVariant::Sent => 0,
        BubbleVariant::Received => 1,
    });
    match &record.author_photo_url {
        Some(url) => {
            hasher.write_u8(1);
            hasher.write(url.as_bytes());
        }
        None => hasher.write_u8(0),
    }

    hasher.finish()
}

fn estimate_row_height(record: &MessageRecord, content_width: Pixels) -> Pixels {
    let bubble_width = min_pixels(
        max_pixels(px(1.), content_width - AVATAR_SIZE - AVATAR_GAP),
        BUBBLE_MAX_WIDTH,
    );
    let text_width = max_pixels(px(1.), bubble_width - BUBBLE_PADDING_X * 2);
    let bubble_height = estimate_text_height(&record.text, text_width) + BUBBLE_PADDING_Y * 2;

    max_pixels(bubble_height, AVATAR_SIZE)
}

fn estimate_text_height(content: &str, width: Pixels) -> Pixels {
    if content.is_empty() {
        return ESTIMATED_TEXT_LINE_HEIGHT;
    }

    let width_as_f32 = f32::from(width);
    let chars_per_line = (width_as_f32 / ESTIMATED_CHAR_WIDTH).floor().max(1.0) as usize;

    let mut line_count = 0usize;
    for line in content.lines() {
        let char_count = line.chars().count().max(1);
        line_count += char_count.div_ceil(chars_per_line);
    }

    if content.ends_with('\n') {
        line_count += 1;
    }

    ESTIMATED_TEXT_LINE_HEIGHT * line_count.max(1)
}

fn max_pixels(a: Pixels, b: Pixels) -> Pixels {
    if f32::from(a) >= f32::from(b) { a } else { b }
}

fn min_pixels(a: Pixels, b: Pixels) -> Pixels {
    if f32::from(a) <= f32::from(b) { a } else { b }
}

fn pixels_changed(a: Pixels, b: Pixels) -> bool {
    (f32::from(a) - f32::from(b)).abs() > 0.5
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn record(id: &str, author: &str, photo_url: Option<&str>) -> MessageRecord {
        MessageRecord {
            id: MessageId::new(id),
            text: format!("row {id}"),
            author_uid: UserId::new(author),
            author_photo_url: photo_url.map(str::to_string),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn own_messages_render_as_sent() {
        let viewer = UserId::new("uid-1");
        assert_eq!(
            bubble_variant(&record("m1", "uid-1", None), &viewer),
            BubbleVariant::Sent
        );
        assert_eq!(
            bubble_variant(&record("m2", "uid-2", None), &viewer),
            BubbleVariant::Received
        );
    }

    #[test]
    fn missing_or_blank_photo_urls_fall_back_to_the_placeholder() {
        assert_eq!(avatar_source(None), AvatarSource::Placeholder);
        assert_eq!(avatar_source(Some("")), AvatarSource::Placeholder);
        assert_eq!(avatar_source(Some("   ")), AvatarSource::Placeholder);
        assert_eq!(
            avatar_source(Some("https://img.example/a.png")),
            AvatarSource::Remote("https://img.example/a.png")
        );
    }

    #[test]
    fn full_window_fixture_keeps_row_metrics_deterministic() {
        let viewer = UserId::new("uid-1");
        let mut records = (0..100)
            .map(|index| {
                let author = if index % 2 == 0 { "uid-1" } else { "uid-2" };
                let mut record = record(&format!("m{index:03}"), author, None);
                record.text = format!("message-{index}: feed fixture payload");
                record
            })
            .collect::<Vec<_>>();

        let content_width = px(640.);
        let heights_before = records
            .iter()
            .map(|record| estimate_row_height(record, content_width))
            .collect::<Vec<_>>();
        let hashes_before = records
            .iter()
            .map(|record| layout_hash(record, bubble_variant(record, &viewer)))
            .collect::<Vec<_>>();

        assert_eq!(heights_before.len(), 100);
        assert!(heights_before.iter().all(|height| *height > Pixels::ZERO));

        if let Some(last_record) = records.last_mut() {
            // Tail-only mutation should invalidate only the final row hash.
            last_record.text.push_str(" (edited)");
        }

        let hashes_after = records
            .iter()
            .map(|record| layout_hash(record, bubble_variant(record, &viewer)))
            .collect::<Vec<_>>();

        assert_eq!(hashes_before[..99], hashes_after[..99]);
        assert_ne!(hashes_before[99], hashes_after[99]);
    }

    #[test]
    fn variant_flip_invalidates_the_row_hash() {
        let row = record("m1", "uid-1", None);
        assert_ne!(
            layout_hash(&row, BubbleVariant::Sent),
            layout_hash(&row, BubbleVariant::Received)
        );
    }

    #[test]
    fn long_lines_estimate_taller_than_short_ones() {
        let mut short = record("m1", "uid-1", None);
        short.text = "hi".to_string();
        let mut long = record("m2", "uid-1", None);
        long.text = "x".repeat(500);

        let width = px(640.);
        assert!(estimate_row_height(&long, width) > estimate_row_height(&short, width));
        assert_eq!(
            estimate_row_height(&short, width),
            ESTIMATED_TEXT_LINE_HEIGHT + BUBBLE_PADDING_Y * 2
        );
    }
}
