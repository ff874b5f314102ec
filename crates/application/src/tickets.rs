//! 客服工单状态机服务
//!
//! 所有转换守卫都在可信存储的当前记录上求值（读取后条件写），
//! 认领是一次原子比较并交换：并发认领恰好一个客服成功，输家
//! 收到类型化的状态冲突，由连接层转成认领被拒事件。

use std::sync::Arc;

use tracing::{debug, info};

use domain::{
    ConflictReason, DomainError, MessageBody, MessageId, RealtimeEvent, SupportMessage,
    SupportTicket, TicketId, TicketRepository, TicketStatus, UserId, UserRole,
};

use crate::clock::Clock;
use crate::error::{ApplicationError, ApplicationResult};
use crate::relay::EventRelay;

pub struct SupportTicketService {
    ticket_repo: Arc<dyn TicketRepository>,
    relay: Arc<EventRelay>,
    clock: Arc<dyn Clock>,
}

impl SupportTicketService {
    pub fn new(
        ticket_repo: Arc<dyn TicketRepository>,
        relay: Arc<EventRelay>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ticket_repo,
            relay,
            clock,
        }
    }

    /// 创建工单。幂等：发起人已有进行中的工单时原样返回，不报
    /// 错也不重复广播——客户端重复点击或重连重放都会落到这里。
    pub async fn create_ticket(
        &self,
        requester_id: UserId,
        requester_role: UserRole,
    ) -> ApplicationResult<SupportTicket> {
        if requester_role.is_admin() {
            return Err(DomainError::validation("role", "admins cannot open support tickets").into());
        }

        if let Some(existing) = self
            .ticket_repo
            .find_active_by_requester(requester_id)
            .await?
        {
            debug!(ticket_id = %existing.id, requester_id = %requester_id, "active ticket already exists");
            self.relay
                .emit(
                    requester_id,
                    RealtimeEvent::TicketOpened {
                        ticket: existing.clone(),
                    },
                )
                .await;
            return Ok(existing);
        }

        let ticket = SupportTicket::open(TicketId::generate(), requester_id, self.clock.now());
        let ticket = match self.ticket_repo.create(ticket).await {
            Ok(ticket) => ticket,
            // 并发创建撞上唯一约束：把赢家当成自己的结果返回
            Err(domain::RepositoryError::Conflict) => self
                .ticket_repo
                .find_active_by_requester(requester_id)
                .await?
                .ok_or(domain::RepositoryError::Conflict)?,
            Err(err) => return Err(err.into()),
        };

        self.relay
            .emit(
                requester_id,
                RealtimeEvent::TicketOpened {
                    ticket: ticket.clone(),
                },
            )
            .await;
        self.relay
            .emit_to_role(
                UserRole::Admin,
                RealtimeEvent::TicketOpened {
                    ticket: ticket.clone(),
                },
            )
            .await;

        info!(ticket_id = %ticket.id, requester_id = %requester_id, "support ticket opened");
        Ok(ticket)
    }

    /// 认领工单。存储层的比较并交换保证并发下恰好一个赢家；
    /// 输家拿到 already_assigned 的状态冲突，需要刷新工单列表。
    pub async fn claim_ticket(
        &self,
        ticket_id: TicketId,
        admin_id: UserId,
        admin_role: UserRole,
    ) -> ApplicationResult<SupportTicket> {
        if !admin_role.is_admin() {
            return Err(ApplicationError::Authorization);
        }

        match self.ticket_repo.claim(ticket_id, admin_id).await? {
            Some(ticket) => {
                self.relay
                    .emit(
                        ticket.requester_id,
                        RealtimeEvent::TicketAssigned {
                            ticket: ticket.clone(),
                            admin_id,
                        },
                    )
                    .await;
                // 其他客服据此把工单从待认领列表里拿掉
                self.relay
                    .emit_to_role(
                        UserRole::Admin,
                        RealtimeEvent::TicketAssigned {
                            ticket: ticket.clone(),
                            admin_id,
                        },
                    )
                    .await;

                info!(ticket_id = %ticket_id, admin_id = %admin_id, "ticket claimed");
                Ok(ticket)
            }
            None => {
                // 守卫失败：重读当前记录给出准确原因
                let current = self
                    .ticket_repo
                    .find_by_id(ticket_id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("ticket", ticket_id))?;
                let reason = match current.status {
                    TicketStatus::Closed => ConflictReason::TicketClosed,
                    _ => ConflictReason::AlreadyAssigned,
                };
                debug!(ticket_id = %ticket_id, admin_id = %admin_id, reason = %reason, "claim rejected");
                Err(DomainError::state_conflict(reason).into())
            }
        }
    }

    /// 在工单里留言。工单关闭后对任何角色都失败；客服必须先
    /// 认领才能回复。
    pub async fn send_support_message(
        &self,
        ticket_id: TicketId,
        sender_id: UserId,
        sender_role: UserRole,
        body: String,
    ) -> ApplicationResult<SupportMessage> {
        let ticket = self
            .ticket_repo
            .find_by_id(ticket_id)
            .await?
            .ok_or_else(|| DomainError::not_found("ticket", ticket_id))?;

        ticket.ensure_accepts_message_from(sender_id, sender_role)?;

        let message = SupportMessage::new(
            MessageId::generate(),
            ticket_id,
            sender_id,
            sender_role,
            MessageBody::new(body)?,
            self.clock.now(),
        );
        let message = self.ticket_repo.append_message(message).await?;

        let event = RealtimeEvent::SupportMessageReceived {
            message: message.clone(),
        };
        self.relay.emit(ticket.requester_id, event.clone()).await;
        match ticket.assigned_admin_id {
            Some(assignee) => {
                self.relay.emit(assignee, event).await;
            }
            // 未认领阶段广播给在线客服，方便认领前了解上下文
            None => {
                self.relay.emit_to_role(UserRole::Admin, event).await;
            }
        }

        debug!(ticket_id = %ticket_id, sender_id = %sender_id, "support message appended");
        Ok(message)
    }

    /// 关闭工单。只有认领人能从 assigned 状态关闭；closed 是
    /// 终态，之后的留言全部失败。
    pub async fn close_ticket(
        &self,
        ticket_id: TicketId,
        admin_id: UserId,
        admin_role: UserRole,
    ) -> ApplicationResult<SupportTicket> {
        if !admin_role.is_admin() {
            return Err(ApplicationError::Authorization);
        }

        match self
            .ticket_repo
            .close(ticket_id, admin_id, self.clock.now())
            .await?
        {
            Some(ticket) => {
                let event = RealtimeEvent::TicketClosed {
                    ticket: ticket.clone(),
                };
                self.relay.emit(ticket.requester_id, event.clone()).await;
                self.relay.emit_to_role(UserRole::Admin, event).await;

                info!(ticket_id = %ticket_id, admin_id = %admin_id, "ticket closed");
                Ok(ticket)
            }
            None => {
                let current = self
                    .ticket_repo
                    .find_by_id(ticket_id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("ticket", ticket_id))?;
                let reason = match current.status {
                    TicketStatus::Closed => ConflictReason::TicketClosed,
                    TicketStatus::Open => ConflictReason::ClaimRequired,
                    TicketStatus::Assigned => ConflictReason::NotTicketAssignee,
                };
                Err(DomainError::state_conflict(reason).into())
            }
        }
    }

    /// 待认领工单列表，仅客服可见。
    pub async fn open_tickets(&self, caller_role: UserRole) -> ApplicationResult<Vec<SupportTicket>> {
        if !caller_role.is_admin() {
            return Err(ApplicationError::Authorization);
        }
        Ok(self.ticket_repo.list_open().await?)
    }

    /// 工单留言，发起人和客服可见。
    pub async fn ticket_messages(
        &self,
        ticket_id: TicketId,
        caller_id: UserId,
        caller_role: UserRole,
    ) -> ApplicationResult<Vec<SupportMessage>> {
        let ticket = self
            .ticket_repo
            .find_by_id(ticket_id)
            .await?
            .ok_or_else(|| DomainError::not_found("ticket", ticket_id))?;

        if ticket.requester_id != caller_id && !caller_role.is_admin() {
            return Err(ApplicationError::Authorization);
        }

        Ok(self.ticket_repo.list_messages(ticket_id).await?)
    }
}
