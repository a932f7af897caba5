//! 操作员输入
//!
//! 逐行读取输入。输入结束（EOF）统一表示为 `None`，调用方据此退出或取消当前操作。

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};

pub struct Console<R> {
    lines: Lines<BufReader<R>>,
}

impl<R> Console<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }

    /// 显示提示并读取一行（去除首尾空白）
    pub async fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        print!("{}", label);
        std::io::stdout().flush()?;

        let line = self.lines.next_line().await?;
        Ok(line.map(|line| line.trim().to_string()))
    }

    /// 可选字段：外层 `None` 表示EOF，`Some(None)` 表示留空未填写
    pub async fn prompt_optional(&mut self, label: &str) -> Result<Option<Option<String>>> {
        let line = self.prompt(label).await?;
        Ok(line.map(|value| Some(value).filter(|value| !value.is_empty())))
    }

    /// 只有输入 `y`（不区分大小写）才算确认；EOF返回 `None`
    pub async fn confirm(&mut self, question: &str) -> Result<Option<bool>> {
        let answer = self.prompt(&format!("{} (y/n): ", question)).await?;
        Ok(answer.map(|a| a.eq_ignore_ascii_case("y")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prompt_trims_and_detects_eof() {
        let mut console = Console::new(&b"  Ani Lestari \n"[..]);
        assert_eq!(
            console.prompt("Name: ").await.unwrap().as_deref(),
            Some("Ani Lestari")
        );
        assert_eq!(console.prompt("Name: ").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_confirm_requires_y() {
        let mut console = Console::new(&b"Y\nyes\n\n"[..]);
        assert_eq!(console.confirm("Reset?").await.unwrap(), Some(true));
        assert_eq!(console.confirm("Reset?").await.unwrap(), Some(false));
        assert_eq!(console.confirm("Reset?").await.unwrap(), Some(false));
        // 输入结束，不是否定回答
        assert_eq!(console.confirm("Reset?").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_prompt_optional() {
        let mut console = Console::new(&b"\n0812\n"[..]);
        assert_eq!(console.prompt_optional("Phone: ").await.unwrap(), Some(None));
        assert_eq!(
            console.prompt_optional("Phone: ").await.unwrap(),
            Some(Some("0812".to_string()))
        );
        assert_eq!(console.prompt_optional("Phone: ").await.unwrap(), None);
    }
}
