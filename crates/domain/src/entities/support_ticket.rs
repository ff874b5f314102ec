//! 客服工单实体与状态机
//!
//! 状态流转：open → assigned → closed。closed 是终态，不存在
//! 重新打开的转换；所有转换都由守卫方法把关，越过守卫直接改
//! 字段视为违规。

use serde::{Deserialize, Serialize};

use crate::entities::connection::UserRole;
use crate::errors::{ConflictReason, DomainError, DomainResult};
use crate::value_objects::{MessageBody, MessageId, TicketId, Timestamp, UserId};

/// 工单状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// 等待客服认领
    Open,
    /// 已被某个客服认领
    Assigned,
    /// 已关闭（终态）
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Assigned => "assigned",
            TicketStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(TicketStatus::Open),
            "assigned" => Some(TicketStatus::Assigned),
            "closed" => Some(TicketStatus::Closed),
            _ => None,
        }
    }
}

/// 客服工单。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportTicket {
    pub id: TicketId,
    /// 发起工单的用户（非客服）
    pub requester_id: UserId,
    pub status: TicketStatus,
    /// 认领的客服；只有 claim 成功后才非空
    pub assigned_admin_id: Option<UserId>,
    pub created_at: Timestamp,
    pub closed_at: Option<Timestamp>,
}

impl SupportTicket {
    /// 创建一张新工单，唯一进入 open 状态的途径。
    pub fn open(id: TicketId, requester_id: UserId, now: Timestamp) -> Self {
        Self {
            id,
            requester_id,
            status: TicketStatus::Open,
            assigned_admin_id: None,
            created_at: now,
            closed_at: None,
        }
    }

    /// 工单是否仍在进行中（open 或 assigned）。
    pub fn is_active(&self) -> bool {
        matches!(self.status, TicketStatus::Open | TicketStatus::Assigned)
    }

    /// 认领转换：仅允许 open → assigned。
    pub fn claim(&mut self, admin_id: UserId) -> DomainResult<()> {
        match self.status {
            TicketStatus::Open => {
                self.status = TicketStatus::Assigned;
                self.assigned_admin_id = Some(admin_id);
                Ok(())
            }
            TicketStatus::Assigned => {
                Err(DomainError::state_conflict(ConflictReason::AlreadyAssigned))
            }
            TicketStatus::Closed => Err(DomainError::state_conflict(ConflictReason::TicketClosed)),
        }
    }

    /// 关闭转换：仅允许 assigned → closed，且只能由认领人执行。
    pub fn close(&mut self, admin_id: UserId, now: Timestamp) -> DomainResult<()> {
        match self.status {
            TicketStatus::Open => Err(DomainError::state_conflict(ConflictReason::ClaimRequired)),
            TicketStatus::Closed => Err(DomainError::state_conflict(ConflictReason::TicketClosed)),
            TicketStatus::Assigned => {
                if self.assigned_admin_id != Some(admin_id) {
                    return Err(DomainError::state_conflict(
                        ConflictReason::NotTicketAssignee,
                    ));
                }
                self.status = TicketStatus::Closed;
                self.closed_at = Some(now);
                Ok(())
            }
        }
    }

    /// 工单是否接受来自 (sender, role) 的留言。
    ///
    /// - closed：任何人都不能再留言（终态）。
    /// - open：客服必须先认领才能回复；发起人可以继续补充。
    /// - assigned：只接受发起人和认领人。
    pub fn ensure_accepts_message_from(
        &self,
        sender_id: UserId,
        sender_role: UserRole,
    ) -> DomainResult<()> {
        if self.status == TicketStatus::Closed {
            return Err(DomainError::state_conflict(ConflictReason::TicketClosed));
        }

        if sender_role.is_admin() {
            return match self.status {
                TicketStatus::Open => {
                    Err(DomainError::state_conflict(ConflictReason::ClaimRequired))
                }
                TicketStatus::Assigned if self.assigned_admin_id != Some(sender_id) => Err(
                    DomainError::state_conflict(ConflictReason::NotTicketAssignee),
                ),
                _ => Ok(()),
            };
        }

        if sender_id != self.requester_id {
            return Err(DomainError::validation(
                "sender_id",
                "not a participant of this ticket",
            ));
        }

        Ok(())
    }
}

/// 工单内的一条留言，只增不改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportMessage {
    pub id: MessageId,
    pub ticket_id: TicketId,
    pub sender_id: UserId,
    pub sender_role: UserRole,
    pub body: MessageBody,
    pub created_at: Timestamp,
}

impl SupportMessage {
    pub fn new(
        id: MessageId,
        ticket_id: TicketId,
        sender_id: UserId,
        sender_role: UserRole,
        body: MessageBody,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            ticket_id,
            sender_id,
            sender_role,
            body,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn ticket() -> SupportTicket {
        SupportTicket::open(
            TicketId::generate(),
            UserId::new(Uuid::new_v4()),
            Utc::now(),
        )
    }

    fn admin() -> UserId {
        UserId::new(Uuid::new_v4())
    }

    #[test]
    fn claim_succeeds_only_from_open() {
        let mut t = ticket();
        let a = admin();

        assert!(t.claim(a).is_ok());
        assert_eq!(t.status, TicketStatus::Assigned);
        assert_eq!(t.assigned_admin_id, Some(a));
    }

    #[test]
    fn second_claim_is_rejected_as_already_assigned() {
        let mut t = ticket();
        let first = admin();
        let second = admin();

        t.claim(first).unwrap();
        let err = t.claim(second).unwrap_err();

        assert_eq!(
            err,
            DomainError::StateConflict {
                reason: ConflictReason::AlreadyAssigned
            }
        );
        // 失败的认领绝不能覆盖已有认领人
        assert_eq!(t.assigned_admin_id, Some(first));
    }

    #[test]
    fn claim_on_closed_ticket_reports_terminal_state() {
        let mut t = ticket();
        let a = admin();
        t.claim(a).unwrap();
        t.close(a, Utc::now()).unwrap();

        let err = t.claim(admin()).unwrap_err();
        assert_eq!(
            err,
            DomainError::StateConflict {
                reason: ConflictReason::TicketClosed
            }
        );
    }

    #[test]
    fn close_requires_assignment_and_assignee() {
        let mut t = ticket();
        let a = admin();

        // open 状态不能直接关闭
        assert_eq!(
            t.close(a, Utc::now()).unwrap_err(),
            DomainError::StateConflict {
                reason: ConflictReason::ClaimRequired
            }
        );

        t.claim(a).unwrap();

        // 非认领人不能关闭
        assert_eq!(
            t.close(admin(), Utc::now()).unwrap_err(),
            DomainError::StateConflict {
                reason: ConflictReason::NotTicketAssignee
            }
        );

        assert!(t.close(a, Utc::now()).is_ok());
        assert_eq!(t.status, TicketStatus::Closed);
        assert!(t.closed_at.is_some());
    }

    #[test]
    fn closed_ticket_rejects_messages_from_everyone() {
        let mut t = ticket();
        let requester = t.requester_id;
        let a = admin();
        t.claim(a).unwrap();
        t.close(a, Utc::now()).unwrap();

        for (sender, role) in [
            (requester, UserRole::Customer),
            (a, UserRole::Admin),
            (UserId::new(Uuid::new_v4()), UserRole::Provider),
        ] {
            assert_eq!(
                t.ensure_accepts_message_from(sender, role).unwrap_err(),
                DomainError::StateConflict {
                    reason: ConflictReason::TicketClosed
                }
            );
        }
    }

    #[test]
    fn admin_must_claim_before_replying() {
        let t = ticket();
        let err = t
            .ensure_accepts_message_from(admin(), UserRole::Admin)
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::StateConflict {
                reason: ConflictReason::ClaimRequired
            }
        );
    }

    #[test]
    fn assigned_ticket_accepts_requester_and_assignee_only() {
        let mut t = ticket();
        let requester = t.requester_id;
        let assignee = admin();
        t.claim(assignee).unwrap();

        assert!(t
            .ensure_accepts_message_from(requester, UserRole::Customer)
            .is_ok());
        assert!(t
            .ensure_accepts_message_from(assignee, UserRole::Admin)
            .is_ok());

        // 其他客服不能插话
        assert_eq!(
            t.ensure_accepts_message_from(admin(), UserRole::Admin)
                .unwrap_err(),
            DomainError::StateConflict {
                reason: ConflictReason::NotTicketAssignee
            }
        );

        // 无关用户不是工单参与者
        assert!(matches!(
            t.ensure_accepts_message_from(UserId::new(Uuid::new_v4()), UserRole::Provider),
            Err(DomainError::Validation { .. })
        ));
    }

    #[test]
    fn status_parse_round_trip() {
        for status in [
            TicketStatus::Open,
            TicketStatus::Assigned,
            TicketStatus::Closed,
        ] {
            assert_eq!(TicketStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TicketStatus::parse("reopened"), None);
    }
}
