use std::time::Instant;

use gpui::prelude::FluentBuilder;
use gpui::{
    AnyElement, Context, Div, InteractiveElement, IntoElement, MouseButton, MouseDownEvent,
    MouseMoveEvent, MouseUpEvent, ObjectFit, ParentElement, ScrollWheelEvent, SharedString,
    StatefulInteractiveElement, Styled, StyledImage, Window, div, img, px, relative,
};
use gpui_component::{
    ActiveTheme, StyledExt,
    button::{Button, ButtonVariants},
    h_flex,
    tag::Tag,
    v_flex,
};

use super::{AppView, HandsState, OrbitDrag, PanelResizeState};
use crate::{
    hierarchy::{HEADER_LABELS, HierarchyTree},
    landmark::TABLE_HEADERS,
    playback::{Playback, TimelineState},
};

pub(super) const RIGHT_PANEL_MIN_WIDTH: f32 = 260.0;
pub(super) const RIGHT_PANEL_MAX_WIDTH: f32 = 640.0;
const HIERARCHY_PANEL_WIDTH: f32 = 320.0;
const HUMANOID_PANEL_WIDTH: f32 = 240.0;
const CHAR_WIDTH: f32 = 7.5;
const ORBIT_DEGREES_PER_PIXEL: f32 = 0.4;
const ZOOM_PER_PIXEL: f32 = 0.002;

impl AppView {
    pub(super) fn render_main(
        &mut self,
        _window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        let background = theme.background;
        let foreground = theme.foreground;

        let hierarchy_panel = self
            .hierarchy
            .as_ref()
            .map(|tree| self.render_hierarchy(tree, cx));
        let humanoid_panel = self.render_humanoid(cx);
        let landmark_panel = self.hands.as_ref().map(|hands| self.render_landmark(hands, cx));
        let timeline = self
            .playback
            .as_ref()
            .filter(|playback| playback.is_loaded())
            .map(|playback| render_timeline(playback, cx));
        let viewport = self.render_viewport(cx);

        v_flex()
            .size_full()
            .bg(background)
            .text_color(foreground)
            .when(self.panel_resize.is_some(), |this| this.cursor_ew_resize())
            .on_mouse_move(cx.listener(Self::update_panel_resize))
            .on_mouse_up(MouseButton::Left, cx.listener(Self::finish_panel_resize))
            .child(
                h_flex()
                    .flex_1()
                    .min_h_0()
                    .w_full()
                    .when_some(hierarchy_panel, |this, panel| this.child(panel))
                    .child(viewport)
                    .child(humanoid_panel)
                    .when_some(landmark_panel, |this, panel| this.child(panel)),
            )
            .when_some(timeline, |this, timeline| this.child(timeline))
            .into_any_element()
    }

    fn render_hierarchy(&self, tree: &HierarchyTree, cx: &Context<'_, Self>) -> AnyElement {
        let theme = cx.theme();
        let widths = tree.column_widths().map(|chars| px(chars as f32 * CHAR_WIDTH + 12.0));
        let indent = HierarchyTree::indent_width() as f32 * CHAR_WIDTH;

        let header = h_flex()
            .px_2()
            .py_1()
            .border_b_1()
            .border_color(theme.border)
            .bg(theme.muted)
            .font_semibold()
            .children(
                HEADER_LABELS
                    .iter()
                    .zip(widths)
                    .map(|(label, width)| div().w(width).flex_none().child(*label)),
            );

        let rows = tree.rows().into_iter().map(|(depth, item)| {
            let [name, offset, channels] = item.columns();
            h_flex()
                .px_2()
                .child(
                    div()
                        .w(widths[0])
                        .flex_none()
                        .pl(px(depth as f32 * indent))
                        .child(name.to_string()),
                )
                .child(div().w(widths[1]).flex_none().child(offset.to_string()))
                .child(
                    div()
                        .w(widths[2])
                        .flex_none()
                        .text_color(theme.muted_foreground)
                        .child(channels.to_string()),
                )
        });

        let body = div()
            .id("hierarchy-rows")
            .flex_1()
            .overflow_scroll()
            .font_family(theme.mono_font_family.clone())
            .text_xs()
            .child(header)
            .children(rows)
            .when(tree.is_empty() && self.hierarchy_error.is_none(), |this| {
                this.child(
                    div()
                        .p_2()
                        .text_color(theme.muted_foreground)
                        .child("No joints"),
                )
            })
            .when_some(self.hierarchy_error.clone(), |this, err| {
                this.child(div().p_2().child(Tag::danger().child(err)))
            });

        v_flex()
            .w(px(HIERARCHY_PANEL_WIDTH))
            .h_full()
            .flex_none()
            .border_r_1()
            .border_color(theme.border)
            .bg(theme.group_box)
            .child(panel_title("Hierarchy", cx))
            .child(body)
            .into_any_element()
    }

    fn render_humanoid(&self, cx: &mut Context<'_, Self>) -> AnyElement {
        let toggle_label = if self.show_humanoid { "Hide" } else { "Show" };
        let toggle = Button::new(SharedString::from("humanoid-toggle"))
            .outline()
            .label(toggle_label)
            .on_click(cx.listener(|this, _, _, cx| {
                this.toggle_humanoid();
                cx.notify();
            }));

        let theme = cx.theme();
        let indent = HierarchyTree::indent_width() as f32 * CHAR_WIDTH;
        let rows = self
            .humanoid_view
            .scene
            .rows()
            .into_iter()
            .map(|(depth, name, position)| {
                h_flex()
                    .px_2()
                    .justify_between()
                    .child(div().pl(px(depth as f32 * indent)).child(name))
                    .child(
                        div()
                            .text_color(theme.muted_foreground)
                            .child(format_position([position.x, position.y, position.z])),
                    )
            });

        v_flex()
            .w(px(HUMANOID_PANEL_WIDTH))
            .h_full()
            .flex_none()
            .border_l_1()
            .border_color(theme.border)
            .bg(theme.group_box)
            .child(
                panel_title("Humanoid", cx)
                    .flex()
                    .justify_between()
                    .items_center()
                    .child(toggle),
            )
            .child(
                div()
                    .id("humanoid-rows")
                    .flex_1()
                    .overflow_y_scroll()
                    .font_family(theme.mono_font_family.clone())
                    .text_xs()
                    .children(rows),
            )
            .into_any_element()
    }

    fn render_viewport(&self, cx: &mut Context<'_, Self>) -> AnyElement {
        let content: AnyElement = match &self.viewport_image {
            Some(image) => img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .into_any_element(),
            None => div()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_color(cx.theme().muted_foreground)
                .child("Pass a .bvh file to view its motion")
                .into_any_element(),
        };

        div()
            .id("viewport")
            .flex_1()
            .h_full()
            .min_w_0()
            .overflow_hidden()
            .child(content)
            .on_mouse_down(MouseButton::Left, cx.listener(Self::start_orbit))
            .on_mouse_move(cx.listener(Self::update_orbit))
            .on_mouse_up(MouseButton::Left, cx.listener(Self::finish_orbit))
            .on_mouse_up_out(MouseButton::Left, cx.listener(Self::finish_orbit))
            .on_scroll_wheel(cx.listener(Self::zoom_viewport))
            .into_any_element()
    }

    fn render_landmark(&self, hands: &HandsState, cx: &mut Context<'_, Self>) -> AnyElement {
        let panel_handle = div()
            .absolute()
            .left(px(-4.0))
            .top(px(0.0))
            .bottom(px(0.0))
            .w(px(8.0))
            .cursor_ew_resize()
            .on_mouse_down(MouseButton::Left, cx.listener(Self::start_panel_resize))
            .on_mouse_move(cx.listener(Self::update_panel_resize))
            .on_mouse_up(MouseButton::Left, cx.listener(Self::finish_panel_resize))
            .on_mouse_up_out(MouseButton::Left, cx.listener(Self::finish_panel_resize));

        let theme = cx.theme();
        let panel_width = self
            .right_panel_width
            .clamp(RIGHT_PANEL_MIN_WIDTH, RIGHT_PANEL_MAX_WIDTH);

        let capture: AnyElement = match &hands.capture_image {
            Some(image) => img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .into_any_element(),
            None => div()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_sm()
                .text_color(theme.muted_foreground)
                .child("Waiting for camera...")
                .into_any_element(),
        };

        let status: AnyElement = if let Some(err) = &hands.camera_error {
            Tag::danger().child(format!("Camera error: {err}")).into_any_element()
        } else if !hands.download.is_ready() {
            let download = &hands.download;
            v_flex()
                .gap_1()
                .child(div().text_sm().child(download.message.clone()))
                .child(
                    div()
                        .px_2()
                        .rounded_md()
                        .bg(theme.muted)
                        .font_family(theme.mono_font_family.clone())
                        .text_xs()
                        .child(download.bar()),
                )
                .child(
                    div()
                        .text_xs()
                        .text_color(theme.muted_foreground)
                        .child(download.detail()),
                )
                .when_some(download.error.clone(), |this, err| {
                    this.child(Tag::danger().child(err))
                })
                .into_any_element()
        } else {
            let (icon, text, color) = if hands.capture_image.is_some() {
                ("●", "Tracking", theme.success)
            } else {
                ("○", "Starting camera", theme.muted_foreground)
            };
            div()
                .text_sm()
                .text_color(color)
                .child(format!(
                    "{icon} {text} ({})",
                    hands.landmark.handedness_label()
                ))
                .into_any_element()
        };

        let table_row = |cells: [String; 4]| {
            h_flex().children(
                cells
                    .into_iter()
                    .map(|cell| div().flex_1().child(cell)),
            )
        };
        let table = div()
            .id("landmark-table")
            .flex_1()
            .overflow_y_scroll()
            .font_family(theme.mono_font_family.clone())
            .text_xs()
            .child(
                table_row(TABLE_HEADERS.map(String::from))
                    .border_b_1()
                    .border_color(theme.border)
                    .font_semibold(),
            )
            .children(hands.landmark.table_rows().into_iter().map(table_row));

        div()
            .relative()
            .w(px(panel_width))
            .h_full()
            .flex_none()
            .border_l_1()
            .border_color(theme.border)
            .bg(theme.group_box)
            .child(
                v_flex()
                    .size_full()
                    .gap_2()
                    .child(panel_title("Hand landmarks", cx))
                    .child(
                        div()
                            .w_full()
                            .h(px(panel_width * 0.75))
                            .flex_none()
                            .bg(gpui::rgb(0x000000))
                            .child(capture),
                    )
                    .child(div().px_2().child(status))
                    .child(div().px_2().flex_1().min_h_0().flex().child(table)),
            )
            .child(panel_handle)
            .into_any_element()
    }

    fn start_orbit(&mut self, event: &MouseDownEvent, _: &mut Window, cx: &mut Context<'_, Self>) {
        self.orbit_drag = Some(OrbitDrag {
            last: (f32::from(event.position.x), f32::from(event.position.y)),
        });
        cx.notify();
    }

    fn update_orbit(&mut self, event: &MouseMoveEvent, _: &mut Window, cx: &mut Context<'_, Self>) {
        let Some(drag) = self.orbit_drag.as_mut() else {
            return;
        };
        if !event.dragging() {
            self.orbit_drag = None;
            return;
        }

        let position = (f32::from(event.position.x), f32::from(event.position.y));
        let (dx, dy) = (position.0 - drag.last.0, position.1 - drag.last.1);
        drag.last = position;
        for layer in self.layers_mut() {
            layer
                .camera_mut()
                .orbit(-dx * ORBIT_DEGREES_PER_PIXEL, dy * ORBIT_DEGREES_PER_PIXEL);
        }
        self.viewport_dirty = true;
        cx.notify();
    }

    fn finish_orbit(&mut self, _: &MouseUpEvent, _: &mut Window, cx: &mut Context<'_, Self>) {
        if self.orbit_drag.take().is_some() {
            cx.notify();
        }
    }

    fn zoom_viewport(
        &mut self,
        event: &ScrollWheelEvent,
        _: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        let delta = f32::from(event.delta.pixel_delta(px(16.0)).y);
        if delta == 0.0 {
            return;
        }
        let factor = (1.0 - delta * ZOOM_PER_PIXEL).clamp(0.5, 2.0);
        for layer in self.layers_mut() {
            layer.camera_mut().zoom(factor);
        }
        self.viewport_dirty = true;
        cx.notify();
    }

    fn start_panel_resize(
        &mut self,
        event: &MouseDownEvent,
        _: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        self.panel_resize = Some(PanelResizeState {
            start_pointer_x: f32::from(event.position.x),
            start_width: self.right_panel_width,
        });
        cx.notify();
    }

    fn update_panel_resize(
        &mut self,
        event: &MouseMoveEvent,
        _: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        let Some(state) = &self.panel_resize else {
            return;
        };
        if !event.dragging() {
            self.panel_resize = None;
            cx.notify();
            return;
        }

        let delta_x = f32::from(event.position.x) - state.start_pointer_x;
        let width = (state.start_width - delta_x).clamp(RIGHT_PANEL_MIN_WIDTH, RIGHT_PANEL_MAX_WIDTH);
        if (width - self.right_panel_width).abs() > f32::EPSILON {
            self.right_panel_width = width;
            cx.notify();
        }
    }

    fn finish_panel_resize(
        &mut self,
        _: &MouseUpEvent,
        _: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if self.panel_resize.take().is_some() {
            cx.notify();
        }
    }

    fn start_playback(&mut self) {
        let frame = self
            .playback
            .as_mut()
            .and_then(|playback| playback.start(Instant::now()));
        if let Some(frame) = frame {
            self.set_frame(frame);
        }
    }

    fn step_playback(&mut self, delta: isize) {
        let frame = self
            .playback
            .as_mut()
            .and_then(|playback| playback.step(delta));
        if let Some(frame) = frame {
            self.set_frame(frame);
        }
    }
}

fn panel_title(title: &'static str, cx: &Context<'_, AppView>) -> Div {
    let theme = cx.theme();
    div()
        .px_2()
        .py_1()
        .border_b_1()
        .border_color(theme.border)
        .text_sm()
        .font_semibold()
        .child(title)
}

fn format_position([x, y, z]: [f32; 3]) -> String {
    format!("({x:.2}, {y:.2}, {z:.2})")
}

fn render_timeline(playback: &Playback, cx: &mut Context<'_, AppView>) -> AnyElement {
    let theme = cx.theme();
    let (value, max) = playback.progress();
    let state = playback.state();
    let pause_label = match state {
        TimelineState::Running => "Pause",
        TimelineState::Paused | TimelineState::NotRunning => "Resume",
    };
    let track = theme.muted;
    let fill = theme.accent;
    let border = theme.border;
    let label_color = theme.muted_foreground;
    let mono = theme.mono_font_family.clone();

    h_flex()
        .w_full()
        .flex_none()
        .gap_2()
        .px_3()
        .py_2()
        .items_center()
        .border_t_1()
        .border_color(border)
        .child(
            Button::new(SharedString::from("timeline-start"))
                .outline()
                .label("Start")
                .on_click(cx.listener(|this, _, _, cx| {
                    this.start_playback();
                    cx.notify();
                })),
        )
        .child(
            Button::new(SharedString::from("timeline-pause"))
                .outline()
                .label(pause_label)
                .on_click(cx.listener(|this, _, _, cx| {
                    if let Some(playback) = this.playback.as_mut() {
                        playback.toggle_pause(Instant::now());
                    }
                    cx.notify();
                })),
        )
        .child(
            Button::new(SharedString::from("timeline-stop"))
                .outline()
                .label("Stop")
                .on_click(cx.listener(|this, _, _, cx| {
                    if let Some(playback) = this.playback.as_mut() {
                        playback.stop();
                    }
                    cx.notify();
                })),
        )
        .child(
            Button::new(SharedString::from("timeline-prev"))
                .outline()
                .label("◀")
                .on_click(cx.listener(|this, _, _, cx| {
                    this.step_playback(-1);
                    cx.notify();
                })),
        )
        .child(
            Button::new(SharedString::from("timeline-next"))
                .outline()
                .label("▶")
                .on_click(cx.listener(|this, _, _, cx| {
                    this.step_playback(1);
                    cx.notify();
                })),
        )
        .child(
            div()
                .flex_1()
                .h(px(8.0))
                .rounded_full()
                .bg(track)
                .overflow_hidden()
                .child(
                    div()
                        .h_full()
                        .w(relative(playback.progress_fraction()))
                        .bg(fill),
                ),
        )
        .child(
            div()
                .flex_none()
                .font_family(mono)
                .text_sm()
                .text_color(label_color)
                .child(format!("{value} / {max}")),
        )
        .into_any_element()
}
