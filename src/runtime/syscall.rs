use crate::error::RuntimeError;
use crate::nodes::MenuOption;

/// 系统调用接口
/// Sentence 通过此接口控制 Executor 的调度
///
/// A sentence must call exactly one of `advance`, `goto`, `jump_to` or
/// `jump_to_next`, or none of them to suspend until the host resumes.
pub trait Syscall {
    /// 当前语句序号
    fn index(&self) -> usize;

    /// 前进到下一条语句
    fn advance(&mut self);

    /// 跳转到指定语句
    fn goto(&mut self, target: usize);

    /// 跨脚本跳转 (由具体执行器决定是否支持)
    fn jump_to(&mut self, label: &str) -> Result<(), RuntimeError>;

    /// 沿默认分支进入下一个脚本
    fn jump_to_next(&mut self) -> Result<(), RuntimeError>;

    fn push_scope(&mut self, opener: usize);
    fn pop_scope(&mut self) -> Option<usize>;

    fn set_character(&mut self, key: &str, extra: &str) -> Result<(), RuntimeError>;
    fn clear_character(&mut self);
    fn set_text(&mut self, content: &str) -> Result<(), RuntimeError>;
    fn show_menu(&mut self, options: &[MenuOption]);

    fn predicate(&mut self, expression: &str) -> Result<bool, RuntimeError>;
}
