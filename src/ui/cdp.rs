//! headless_chrome 适配器：连接已打开的 Chrome（--remote-debugging-port），在房间页面里执行脚本
//!
//! 页面元素通过 `data-ccf-*` 属性打标签，句柄里只保存标签值；每次操作都重新按标签查找。
//! headless_chrome 是同步 API，所有调用放在 spawn_blocking 里。

use std::sync::Arc;

use async_trait::async_trait;
use headless_chrome::{Browser, Tab};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::{
    DialogField, DialogHandle, EditorHandle, ElementRef, MenuItemHandle, NodeHandle, PieceHandle, Point,
    Rect, UiAdapter, UiError, Viewport,
};

/// 所有脚本共享的页面辅助函数
const PRELUDE: &str = r#"
const ccf = {
  norm: (s) => String(s ?? '').replace(/\u00a0/g, ' ').replace(/\s+/g, ' ').trim(),
  seq: () => { window.__ccfSeq = (window.__ccfSeq || 0) + 1; return String(window.__ccfSeq); },
  tag: (el, attr) => {
    if (!el.getAttribute(attr)) el.setAttribute(attr, ccf.seq());
    return el.getAttribute(attr);
  },
  byTag: (attr, id) => document.querySelector(`[${attr}="${CSS.escape(id)}"]`),
  visible: (el) => {
    if (!(el instanceof HTMLElement)) return false;
    const r = el.getBoundingClientRect();
    return r.width > 0 && r.height > 0 && r.bottom > 0 && r.right > 0;
  },
  setValue: (el, value) => {
    const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
    const setter = Object.getOwnPropertyDescriptor(proto, 'value')?.set;
    if (setter) setter.call(el, value); else el.value = value;
    el.dispatchEvent(new InputEvent('input', { bubbles: true, cancelable: true, data: value }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
  },
  escape: () => {
    const t = document.activeElement || document.body;
    for (const type of ['keydown', 'keyup']) {
      t.dispatchEvent(new KeyboardEvent(type, { key: 'Escape', code: 'Escape', keyCode: 27, which: 27, bubbles: true, cancelable: true }));
    }
  },
  dialogInput: (dialog, field) => {
    const q = (sel) => dialog.querySelector(sel);
    const byLabel = (text) => {
      const label = Array.from(dialog.querySelectorAll('*')).find((el) => (el.textContent || '').trim() === text);
      const block = label && (label.closest('div,section,header') || label.parentElement);
      return block ? block.querySelector('input') : null;
    };
    switch (field) {
      case 'name':
        return q('input[name="name"], input[name="characterName"], input[aria-label="名前"]') || byLabel('名前');
      case 'x': return q('input[name="x"]');
      case 'y': return q('input[name="y"]');
      default:
        return q('input[name="width"], input[name="size"], input[aria-label="駒サイズ"]') || byLabel('駒サイズ');
    }
  },
  messageContainer: (node) => {
    const p = node.matches?.('p.MuiListItemText-secondary') ? node : node.querySelector?.('p.MuiListItemText-secondary');
    return (p && (p.closest('div.MuiListItem-root') || p.closest('li.MuiListItem-root'))) || node;
  },
};
"#;

#[derive(Debug, Deserialize)]
struct RawPiece {
    id: String,
    label: String,
    caption: Option<String>,
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

#[derive(Debug, Deserialize)]
struct RawMenuItem {
    id: String,
    label: String,
}

pub struct CdpAdapter {
    tab: Arc<Tab>,
    _browser: Browser,
}

impl CdpAdapter {
    /// 连接浏览器并选中 URL 含 page_url_contains 的标签页（阻塞调用）
    pub fn connect(debug_ws_url: &str, page_url_contains: &str) -> Result<Self, UiError> {
        let browser = Browser::connect(debug_ws_url.to_string())
            .map_err(|e| UiError::Protocol(format!("connect {}: {}", debug_ws_url, e)))?;
        browser.register_missing_tabs();
        let tab = {
            let tabs = browser
                .get_tabs()
                .lock()
                .map_err(|_| UiError::Protocol("tab list poisoned".into()))?;
            tabs.iter()
                .find(|t| t.get_url().contains(page_url_contains))
                .cloned()
                .ok_or_else(|| UiError::Protocol(format!("no tab matching '{}'", page_url_contains)))?
        };
        tracing::info!(url = %tab.get_url(), "Attached to room tab");
        Ok(Self { tab, _browser: browser })
    }

    pub fn tab(&self) -> Arc<Tab> {
        self.tab.clone()
    }

    /// 执行脚本体（可 await），结果经 JSON 往返
    async fn eval<T: DeserializeOwned + Send + 'static>(&self, body: String) -> Result<T, UiError> {
        eval_in(self.tab.clone(), body).await
    }
}

/// body 里可以使用 ccf 辅助函数，最后 return 的值会被序列化带回
pub(crate) async fn eval_in<T: DeserializeOwned + Send + 'static>(tab: Arc<Tab>, body: String) -> Result<T, UiError> {
    let script = format!("(async () => {{ {PRELUDE}\nconst __r = await (async () => {{ {body} }})();\nreturn JSON.stringify(__r ?? null); }})()");
    let raw = tokio::task::spawn_blocking(move || tab.evaluate(&script, true))
        .await
        .map_err(|e| UiError::Script(format!("join: {}", e)))?
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("closed") || msg.contains("disconnected") {
                UiError::Disconnected
            } else {
                UiError::Script(msg)
            }
        })?;
    let text = match raw.value {
        Some(Value::String(s)) => s,
        other => return Err(UiError::Protocol(format!("expected JSON string, got {:?}", other))),
    };
    serde_json::from_str(&text).map_err(|e| UiError::Protocol(e.to_string()))
}

fn js(value: impl serde::Serialize) -> String {
    serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string())
}

#[async_trait]
impl UiAdapter for CdpAdapter {
    async fn viewport(&self) -> Result<Viewport, UiError> {
        let (width, height): (f64, f64) = self
            .eval("return [window.innerWidth, window.innerHeight];".into())
            .await?;
        Ok(Viewport { width, height })
    }

    async fn write_clipboard(&self, text: &str) -> Result<(), UiError> {
        let result: Option<String> = self
            .eval(format!(
                "try {{ window.focus(); await navigator.clipboard.writeText({}); return null; }} catch (e) {{ return String(e); }}",
                js(text)
            ))
            .await?;
        match result {
            None => Ok(()),
            Some(reason) => Err(UiError::ClipboardRejected(reason)),
        }
    }

    async fn dismiss_menus(&self) -> Result<(), UiError> {
        self.eval::<Value>("ccf.escape(); return null;".into()).await?;
        Ok(())
    }

    async fn open_context_menu(&self, at: Point) -> Result<(), UiError> {
        let found: bool = self
            .eval(format!(
                r#"const x = {x}, y = {y};
                const target = document.elementFromPoint(x, y);
                if (!target) return false;
                for (const type of ['mousedown', 'mouseup', 'contextmenu']) {{
                  target.dispatchEvent(new MouseEvent(type, {{ bubbles: true, cancelable: true, button: 2, buttons: 2, clientX: x, clientY: y }}));
                }}
                return true;"#,
                x = at.x,
                y = at.y
            ))
            .await?;
        if !found {
            tracing::debug!(x = at.x, y = at.y, "No element at point");
        }
        Ok(())
    }

    async fn list_menu_items(&self) -> Result<Vec<MenuItemHandle>, UiError> {
        let items: Vec<RawMenuItem> = self
            .eval(
                r#"const out = [];
                for (const menu of document.querySelectorAll('ul[role="menu"], ul.MuiMenu-list')) {
                  for (const li of menu.querySelectorAll('li.MuiMenuItem-root, li[role="menuitem"]')) {
                    const label = (li.textContent || '').trim();
                    if (label) out.push({ id: ccf.tag(li, 'data-ccf-menu'), label });
                  }
                }
                return out;"#
                    .into(),
            )
            .await?;
        Ok(items
            .into_iter()
            .map(|i| MenuItemHandle { id: i.id, label: i.label })
            .collect())
    }

    async fn activate_menu_item(&self, item: &MenuItemHandle) -> Result<(), UiError> {
        let clicked: bool = self
            .eval(format!(
                "const li = ccf.byTag('data-ccf-menu', {}); if (!li) return false; li.click(); return true;",
                js(&item.id)
            ))
            .await?;
        if clicked {
            Ok(())
        } else {
            Err(UiError::Protocol(format!("menu item '{}' vanished", item.label)))
        }
    }

    async fn list_pieces(&self) -> Result<Vec<PieceHandle>, UiError> {
        let raw: Vec<RawPiece> = self
            .eval(
                r#"return Array.from(document.querySelectorAll('div.movable')).filter(ccf.visible).map((mv) => {
                  const r = mv.getBoundingClientRect();
                  const cap = mv.querySelector('span.MuiTypography-caption, span[class*="MuiTypography-caption"]');
                  const first = mv.querySelector('span');
                  return {
                    id: ccf.tag(mv, 'data-ccf-piece'),
                    label: ccf.norm(first?.textContent),
                    caption: cap ? ccf.norm(cap.textContent) : null,
                    x: r.left, y: r.top, w: r.width, h: r.height,
                  };
                });"#
                    .into(),
            )
            .await?;
        Ok(raw
            .into_iter()
            .map(|p| PieceHandle {
                element: ElementRef(p.id),
                label: p.label,
                caption: p.caption,
                bounds: Rect::new(p.x, p.y, p.w, p.h),
            })
            .collect())
    }

    async fn find_edit_dialog(&self) -> Result<Option<DialogHandle>, UiError> {
        let id: Option<String> = self
            .eval(
                r#"const dialogs = Array.from(document.querySelectorAll('[role="dialog"]'));
                const d = dialogs.find((d) => d.querySelector('svg[data-testid="CloseIcon"]')) || dialogs[0];
                return d ? ccf.tag(d, 'data-ccf-dialog') : null;"#
                    .into(),
            )
            .await?;
        Ok(id.map(DialogHandle))
    }

    async fn read_dialog_field(&self, dialog: &DialogHandle, field: DialogField) -> Result<Option<String>, UiError> {
        self.eval(format!(
            "const d = ccf.byTag('data-ccf-dialog', {}); if (!d) return null; const i = ccf.dialogInput(d, {}); return i ? String(i.value ?? '') : null;",
            js(&dialog.0),
            js(field.as_str())
        ))
        .await
    }

    async fn write_dialog_field(&self, dialog: &DialogHandle, field: DialogField, value: &str) -> Result<bool, UiError> {
        self.eval(format!(
            "const d = ccf.byTag('data-ccf-dialog', {}); if (!d) return false; const i = ccf.dialogInput(d, {}); if (!i) return false; ccf.setValue(i, {}); return true;",
            js(&dialog.0),
            js(field.as_str()),
            js(value)
        ))
        .await
    }

    async fn commit_dialog_field(&self, dialog: &DialogHandle, field: DialogField) -> Result<bool, UiError> {
        self.eval(format!(
            "const d = ccf.byTag('data-ccf-dialog', {}); if (!d) return false; const i = ccf.dialogInput(d, {}); if (!i) return false; i.dispatchEvent(new Event('blur', {{ bubbles: true }})); return true;",
            js(&dialog.0),
            js(field.as_str())
        ))
        .await
    }

    async fn close_dialog(&self, dialog: &DialogHandle) -> Result<(), UiError> {
        self.eval::<Value>(format!(
            r#"const d = ccf.byTag('data-ccf-dialog', {});
            const btn = d?.querySelector('button svg[data-testid="CloseIcon"]')?.closest('button');
            if (btn) btn.click(); else ccf.escape();
            return null;"#,
            js(&dialog.0)
        ))
        .await?;
        Ok(())
    }

    async fn message_attached(&self, node: &NodeHandle) -> Result<bool, UiError> {
        self.eval(format!(
            "const n = ccf.byTag('data-ccf-node', {}); return !!(n && n.isConnected);",
            js(&node.0)
        ))
        .await
    }

    async fn reveal_message_controls(&self, node: &NodeHandle) -> Result<(), UiError> {
        self.eval::<Value>(format!(
            r#"const n = ccf.byTag('data-ccf-node', {});
            if (n) {{
              const c = ccf.messageContainer(n);
              for (const type of ['mouseenter', 'mouseover', 'mousemove']) {{
                c.dispatchEvent(new MouseEvent(type, {{ bubbles: true, clientX: 1, clientY: 1 }}));
              }}
            }}
            return null;"#,
            js(&node.0)
        ))
        .await?;
        Ok(())
    }

    async fn click_message_edit(&self, node: &NodeHandle) -> Result<bool, UiError> {
        self.eval(format!(
            r#"const n = ccf.byTag('data-ccf-node', {});
            if (!n) return false;
            const c = ccf.messageContainer(n);
            let pen = Array.from(c.querySelectorAll('button.MuiIconButton-root')).find((b) => b.querySelector('svg[data-testid="EditIcon"]'));
            if (!pen) pen = c.querySelector('button.MuiFab-root svg[data-testid="EditIcon"]')?.closest('button');
            if (!pen) return false;
            pen.click();
            return true;"#,
            js(&node.0)
        ))
        .await
    }

    async fn find_message_editor(&self, _node: &NodeHandle) -> Result<Option<EditorHandle>, UiError> {
        let id: Option<String> = self
            .eval(
                r#"const save = Array.from(document.querySelectorAll('button')).find((b) => /保存/.test(b.textContent || ''));
                if (!save) return null;
                let root = save.parentElement;
                for (let i = 0; i < 8 && root; i++, root = root.parentElement) {
                  if (root.querySelector('textarea')) break;
                }
                if (!root) return null;
                const ta = root.querySelector('textarea.MuiInputBase-inputMultiline') || root.querySelector('textarea');
                if (!ta) return null;
                const id = ccf.tag(ta, 'data-ccf-editor');
                save.setAttribute('data-ccf-save', id);
                return id;"#
                    .into(),
            )
            .await?;
        Ok(id.map(EditorHandle))
    }

    async fn clear_and_save(&self, editor: &EditorHandle) -> Result<bool, UiError> {
        self.eval(format!(
            r#"const id = {};
            const ta = ccf.byTag('data-ccf-editor', id);
            const save = ccf.byTag('data-ccf-save', id);
            if (!ta || !save) return false;
            ccf.setValue(ta, '');
            save.click();
            return true;"#,
            js(&editor.0)
        ))
        .await
    }

    async fn post_chat(&self, text: &str) -> Result<bool, UiError> {
        self.eval(format!(
            r#"const box = document.querySelector('textarea[placeholder="メッセージを入力"]');
            if (!box) return false;
            box.focus();
            ccf.setValue(box, {});
            await new Promise((r) => setTimeout(r, 120));
            for (const type of ['keydown', 'keypress', 'keyup']) {{
              box.dispatchEvent(new KeyboardEvent(type, {{ bubbles: true, cancelable: true, key: 'Enter', code: 'Enter', keyCode: 13 }}));
            }}
            return true;"#,
            js(text)
        ))
        .await
    }
}
